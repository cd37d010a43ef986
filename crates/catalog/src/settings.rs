use crate::error::{ErrorKind, Result};
use crate::model::CatalogKind;
use std::time::Duration;

/// Records requested per page.
pub const PAGE_SIZE: usize = 5;
/// Quiet period after the last filter change before a fetch goes out.
pub const DEBOUNCE: Duration = Duration::from_millis(100);
/// URL query parameter mirroring the bookmark-only filter.
pub const BOOKMARK_PARAM: &str = "isBookmark";
pub const TOP_RATED_LIMIT: usize = 9;

/// Tunables for one [`Catalog`](crate::Catalog).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub kind: CatalogKind,
    pub page_size: usize,
    pub debounce: Duration,
    pub bookmark_param: String,
    pub featured_limit: usize,
    pub top_rated_limit: usize,
}

impl Settings {
    pub fn new(kind: CatalogKind) -> Self {
        Self {
            kind,
            page_size: PAGE_SIZE,
            debounce: DEBOUNCE,
            bookmark_param: BOOKMARK_PARAM.to_string(),
            featured_limit: kind.featured_limit(),
            top_rated_limit: TOP_RATED_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            exn::bail!(ErrorKind::InvalidSettings("page size must be at least 1".to_string()));
        }
        if self.bookmark_param.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidSettings("bookmark URL parameter must not be empty".to_string()));
        }
        Ok(())
    }
}
