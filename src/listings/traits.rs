use crate::filters::FilterCriteria;
use crate::models::Property;
use anyhow::Result;
use async_trait::async_trait;

/// Path of the listings endpoint.
pub const LISTINGS_PATH: &str = "/api/listings";

/// Where listings come from.
/// The browser only needs this, so tests and other backends can stand in for the HTTP client.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch listings matching a committed filter set
    async fn fetch_listings(&self, filters: &FilterCriteria) -> Result<Vec<Property>>;

    /// Get the name of the listing source
    fn source_name(&self) -> &'static str;
}

/// Request path for a filter set. No `?` is appended when nothing is set.
pub fn listings_path(filters: &FilterCriteria) -> String {
    let query = filters.to_query_string();
    if query.is_empty() {
        LISTINGS_PATH.to_string()
    } else {
        format!("{LISTINGS_PATH}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterField;

    #[test]
    fn test_bare_path_without_filters() {
        assert_eq!(listings_path(&FilterCriteria::default()), "/api/listings");
    }

    #[test]
    fn test_path_with_filters() {
        let mut filters = FilterCriteria::default();
        filters.set(FilterField::ListingType, "sale");
        filters.set(FilterField::PriceMin, "1000");
        assert_eq!(listings_path(&filters), "/api/listings?listingType=sale&priceMin=1000");
    }
}
