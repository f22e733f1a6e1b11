use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Property;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown sort key: {0} (expected newest, price_asc, price_desc, area_asc or area_desc)")]
pub struct SortKeyError(pub String);

/// Client-side ordering of fetched listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::AreaAsc => "area_asc",
            Self::AreaDesc => "area_desc",
        }
    }

    fn compare(self, a: &Property, b: &Property) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::PriceAsc => a.price.total_cmp(&b.price),
            Self::PriceDesc => b.price.total_cmp(&a.price),
            Self::AreaAsc => a.area.total_cmp(&b.area),
            Self::AreaDesc => b.area.total_cmp(&a.area),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "area_asc" => Ok(Self::AreaAsc),
            "area_desc" => Ok(Self::AreaDesc),
            other => Err(SortKeyError(other.to_string())),
        }
    }
}

/// Sorted copy of `listings`. Equal keys keep their original order and the
/// input is left untouched.
pub fn sort_listings(listings: &[Property], key: SortKey) -> Vec<Property> {
    let mut sorted = listings.to_vec();
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted
}
