use crate::error::{ErrorKind, Result};
use crate::model::{CatalogKind, Category};
use crate::navigate::{Navigator, read_flag};
use curio_store::Query;
use std::sync::Arc;
use tokio::sync::watch;

/// The user's current selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub category: Category,
    /// Free-text region; empty means "anywhere".
    pub region: String,
    pub bookmark_only: bool,
}

impl Filter {
    /// Apply the category and region dimensions to a listing query.
    /// Bookmark membership is resolved separately, since it needs the
    /// bookmark set.
    pub(crate) fn narrow(&self, kind: CatalogKind, mut query: Query) -> Query {
        if let Some(flag) = self.category.flag() {
            query = query.eq(flag, true);
        }
        if !self.region.is_empty() {
            query = query.contains(kind.address_field(), self.region.as_str());
        }
        query
    }
}

/// Owner of the [`Filter`].
///
/// Setters report whether the value actually changed; setting a dimension to
/// its current value is a no-op. Whoever owns the page state is expected to
/// reset it on `true` (the [`Catalog`](crate::Catalog) does).
pub struct FilterController {
    kind: CatalogKind,
    state: watch::Sender<Filter>,
    navigator: Arc<dyn Navigator>,
    param: String,
}

impl FilterController {
    /// Start from the default filter, with bookmark-only seeded from the URL.
    pub fn new(kind: CatalogKind, navigator: Arc<dyn Navigator>, param: impl Into<String>) -> Self {
        let param = param.into();
        let filter = Filter {
            bookmark_only: read_flag(navigator.as_ref(), &param),
            ..Filter::default()
        };
        Self {
            kind,
            state: watch::Sender::new(filter),
            navigator,
            param,
        }
    }

    pub fn current(&self) -> Filter {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Filter> {
        self.state.subscribe()
    }

    pub fn set_category(&self, category: Category) -> Result<bool> {
        if !self.kind.supports(category) {
            exn::bail!(ErrorKind::UnknownCategory(format!("{category} ({})", self.kind)));
        }
        Ok(self.state.send_if_modified(|filter| replace(&mut filter.category, category)))
    }

    pub fn set_region(&self, region: impl Into<String>) -> bool {
        let region = region.into();
        self.state.send_if_modified(|filter| replace(&mut filter.region, region))
    }

    /// Also mirrors the choice into the URL (`isBookmark=true`, or the
    /// parameter removed) with a history push.
    pub fn set_bookmark_only(&self, bookmark_only: bool) -> bool {
        let changed = self.state.send_if_modified(|filter| replace(&mut filter.bookmark_only, bookmark_only));
        if changed {
            self.navigator.push_param(&self.param, bookmark_only.then_some("true"));
        }
        changed
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigate::MemoryNavigator;
    use curio_store::Condition;
    use serde_json::json;

    fn controller(kind: CatalogKind, navigator: &Arc<MemoryNavigator>) -> FilterController {
        FilterController::new(kind, navigator.clone(), "isBookmark")
    }

    #[test]
    fn test_seeded_from_url() {
        let navigator = Arc::new(MemoryNavigator::with_params([("isBookmark", "1")]));
        assert!(controller(CatalogKind::Exhibition, &navigator).current().bookmark_only);
        let navigator = Arc::new(MemoryNavigator::new());
        assert_eq!(controller(CatalogKind::Exhibition, &navigator).current(), Filter::default());
    }

    #[test]
    fn test_setters_report_changes() {
        let navigator = Arc::new(MemoryNavigator::new());
        let filters = controller(CatalogKind::Exhibition, &navigator);
        let mut changes = filters.subscribe();
        assert!(filters.set_category(Category::Free).unwrap());
        assert!(!filters.set_category(Category::Free).unwrap());
        assert!(filters.set_region("Seoul"));
        assert!(!filters.set_region("Seoul"));
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();
        assert!(!filters.set_region("Seoul"));
        assert!(!changes.has_changed().unwrap());
    }

    #[test]
    fn test_unsupported_category() {
        let navigator = Arc::new(MemoryNavigator::new());
        let filters = controller(CatalogKind::Gallery, &navigator);
        let err = filters.set_category(Category::Free).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownCategory(_)));
        assert_eq!(filters.current().category, Category::All);
    }

    #[test]
    fn test_bookmark_only_writes_url() {
        let navigator = Arc::new(MemoryNavigator::with_params([("tab", "free")]));
        let filters = controller(CatalogKind::Exhibition, &navigator);
        assert!(filters.set_bookmark_only(true));
        assert_eq!(navigator.query_string(), "isBookmark=true&tab=free");
        assert!(!filters.set_bookmark_only(true));
        assert!(filters.set_bookmark_only(false));
        assert_eq!(navigator.query_string(), "tab=free");
        assert_eq!(navigator.history().len(), 2);
    }

    #[test]
    fn test_narrow() {
        let filter = Filter {
            category: Category::Free,
            region: "Seoul".to_string(),
            bookmark_only: false,
        };
        let query = filter.narrow(CatalogKind::Exhibition, Query::table("exhibition"));
        assert_eq!(
            query.conditions,
            vec![
                Condition::Eq { field: "isFree".to_string(), value: json!(true) },
                Condition::Contains { field: "gallery.address".to_string(), needle: "Seoul".to_string() },
            ]
        );
        let query = Filter::default().narrow(CatalogKind::Gallery, Query::table("gallery"));
        assert!(query.conditions.is_empty());
    }
}
