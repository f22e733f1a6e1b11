pub mod browser;
pub mod sort;
pub mod traits;

pub use browser::{ListingBrowser, ListingsView};
pub use sort::{sort_listings, SortKey, SortKeyError};
pub use traits::{listings_path, ListingSource};
