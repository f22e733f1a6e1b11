//! Listing search filters: the draft edited by the user and the committed
//! set that drives the active search.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Characters `encodeURIComponent` leaves as they are.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter field: {0}")]
    UnknownField(String),
}

/// A recognized filter key. Declaration order is the order keys appear in
/// query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    ListingType,
    PropertyType,
    Region,
    City,
    District,
    PriceMin,
    PriceMax,
    Rooms,
    Area,
}

impl FilterField {
    pub const ALL: [Self; 9] = [
        Self::ListingType,
        Self::PropertyType,
        Self::Region,
        Self::City,
        Self::District,
        Self::PriceMin,
        Self::PriceMax,
        Self::Rooms,
        Self::Area,
    ];

    /// Query-string key for this field.
    pub const fn key(self) -> &'static str {
        match self {
            Self::ListingType => "listingType",
            Self::PropertyType => "propertyType",
            Self::Region => "region",
            Self::City => "city",
            Self::District => "district",
            Self::PriceMin => "priceMin",
            Self::PriceMax => "priceMax",
            Self::Rooms => "rooms",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FilterField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| FilterError::UnknownField(s.to_string()))
    }
}

/// Search constraints. An empty string means the field is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub listing_type: String,
    pub property_type: String,
    pub region: String,
    pub city: String,
    pub district: String,
    pub price_min: String,
    pub price_max: String,
    pub rooms: String,
    pub area: String,
}

impl FilterCriteria {
    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::ListingType => &self.listing_type,
            FilterField::PropertyType => &self.property_type,
            FilterField::Region => &self.region,
            FilterField::City => &self.city,
            FilterField::District => &self.district,
            FilterField::PriceMin => &self.price_min,
            FilterField::PriceMax => &self.price_max,
            FilterField::Rooms => &self.rooms,
            FilterField::Area => &self.area,
        }
    }

    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        let slot = match field {
            FilterField::ListingType => &mut self.listing_type,
            FilterField::PropertyType => &mut self.property_type,
            FilterField::Region => &mut self.region,
            FilterField::City => &mut self.city,
            FilterField::District => &mut self.district,
            FilterField::PriceMin => &mut self.price_min,
            FilterField::PriceMax => &mut self.price_max,
            FilterField::Rooms => &mut self.rooms,
            FilterField::Area => &mut self.area,
        };
        *slot = value.into();
    }

    /// Fields with a non-empty value, in key order.
    pub fn active(&self) -> impl Iterator<Item = (FilterField, &str)> + '_ {
        FilterField::ALL
            .into_iter()
            .map(|field| (field, self.get(field)))
            .filter(|(_, value)| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Canonical query string: `key=value` pairs for set fields, values
    /// percent-encoded, joined with `&`. Empty when nothing is set.
    pub fn to_query_string(&self) -> String {
        self.active()
            .map(|(field, value)| format!("{}={}", field.key(), utf8_percent_encode(value, COMPONENT)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Parse recognized keys out of a page query string. A leading `?` is
    /// accepted, unknown keys are ignored and a repeated key keeps its first
    /// value.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut criteria = Self::default();
        let mut seen = HashSet::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.parse::<FilterField>() {
                Ok(field) if seen.insert(field) => criteria.set(field, value.into_owned()),
                Ok(field) => debug!("Ignoring repeated query key: {}", field),
                Err(_) => debug!("Ignoring unrecognized query key: {}", key),
            }
        }
        criteria
    }
}

/// Draft and committed filter sets for one page view.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    draft: FilterCriteria,
    committed: FilterCriteria,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed both draft and committed sets from the page query string so the
    /// form and the URL agree on load.
    pub fn from_query(query: &str) -> Self {
        let seed = FilterCriteria::from_query(query);
        Self {
            draft: seed.clone(),
            committed: seed,
        }
    }

    pub fn draft(&self) -> &FilterCriteria {
        &self.draft
    }

    pub fn committed(&self) -> &FilterCriteria {
        &self.committed
    }

    /// Replace one draft field. Does not start a search.
    pub fn set_field(&mut self, field: FilterField, value: impl Into<String>) {
        self.draft.set(field, value);
    }

    /// Like [`FilterState::set_field`], addressing the field by its
    /// query-string key.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::UnknownField` for unrecognized names.
    pub fn set_field_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<(), FilterError> {
        let field = name.parse()?;
        self.set_field(field, value);
        Ok(())
    }

    /// Commit the draft.
    pub fn submit(&mut self) -> &FilterCriteria {
        self.committed = self.draft.clone();
        &self.committed
    }

    /// Clear the draft and commit an empty set.
    pub fn reset(&mut self) -> &FilterCriteria {
        self.draft = FilterCriteria::default();
        self.committed = FilterCriteria::default();
        &self.committed
    }
}
