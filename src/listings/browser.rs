use crate::filters::{FilterCriteria, FilterState};
use crate::listings::sort::{sort_listings, SortKey};
use crate::listings::traits::ListingSource;
use crate::models::Property;
use tracing::{debug, info, warn};

/// What the listing page shows after a search
#[derive(Debug, Clone, PartialEq)]
pub enum ListingsView {
    /// No search has run yet
    NotSearched,
    /// Listings in the current sort order
    Results(Vec<Property>),
    /// The search succeeded but matched nothing; offer a filter reset
    NothingFound,
    /// The source failed; rendered as an empty list with the reason
    Failed(String),
}

impl ListingsView {
    pub fn listings(&self) -> &[Property] {
        match self {
            Self::Results(listings) => listings,
            Self::NotSearched | Self::NothingFound | Self::Failed(_) => &[],
        }
    }
}

/// Filter state, sort key and the last fetched result set for one page view.
pub struct ListingBrowser<S> {
    source: S,
    filters: FilterState,
    sort: SortKey,
    fetched: Option<Result<Vec<Property>, String>>,
}

impl<S: ListingSource> ListingBrowser<S> {
    pub fn new(source: S) -> Self {
        Self::with_filters(source, FilterState::new())
    }

    /// Start from the filters in a page query string
    pub fn from_query(source: S, query: &str) -> Self {
        Self::with_filters(source, FilterState::from_query(query))
    }

    pub fn with_filters(source: S, filters: FilterState) -> Self {
        Self {
            source,
            filters,
            sort: SortKey::default(),
            fetched: None,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Draft edits go through here; they take effect on the next submit
    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    /// Change the sort key and re-sort the last results without refetching
    pub fn set_sort(&mut self, sort: SortKey) -> ListingsView {
        self.sort = sort;
        self.view()
    }

    /// Fetch listings for the committed filters
    pub async fn search(&mut self) -> ListingsView {
        let committed = self.filters.committed().clone();
        self.fetch(&committed).await;
        self.view()
    }

    /// Commit the draft filters and search
    pub async fn submit(&mut self) -> ListingsView {
        let committed = self.filters.submit().clone();
        self.fetch(&committed).await;
        self.view()
    }

    /// Drop every constraint and search again
    pub async fn reset_filters(&mut self) -> ListingsView {
        let committed = self.filters.reset().clone();
        self.fetch(&committed).await;
        self.view()
    }

    /// Current view of the last fetch, in the current sort order
    pub fn view(&self) -> ListingsView {
        match &self.fetched {
            Some(Ok(listings)) if !listings.is_empty() => {
                ListingsView::Results(sort_listings(listings, self.sort))
            }
            Some(Ok(_)) => ListingsView::NothingFound,
            Some(Err(message)) => ListingsView::Failed(message.clone()),
            None => ListingsView::NotSearched,
        }
    }

    async fn fetch(&mut self, filters: &FilterCriteria) {
        debug!(
            "Fetching listings from {} with filters: {}",
            self.source.source_name(),
            filters.to_query_string()
        );

        self.fetched = Some(match self.source.fetch_listings(filters).await {
            Ok(listings) => {
                info!("Fetched {} listings", listings.len());
                Ok(listings)
            }
            Err(e) => {
                warn!("Listing fetch failed: {:#}", e);
                Err(format!("{e:#}"))
            }
        });
    }
}
