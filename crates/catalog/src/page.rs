//! Paginated listing state and the fetcher that drives it.
//!
//! The fetcher is a small state machine over [`PagePhase`]. Every fetch takes
//! a [`RequestTag`] (the state's generation plus the page it wants) before
//! doing anything else, reads the filter only after that, and checks the tag
//! again when the store answers. [`PageFetcher::reset()`] bumps the
//! generation, so anything still in flight for the old state is dropped on
//! arrival instead of being merged into the new one.

use crate::bookmark::{BookmarkSync, Membership};
use crate::error::{Error, ErrorKind};
use crate::filter::{Filter, FilterController};
use crate::model::{CatalogKind, ItemId, ListableItem, parse_items, today};
use curio_store::{Direction, Query, StoreHandle};
use exn::ResultExt;
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::instrument;

/// Identifies one fetch: which generation of the page state it was started
/// for, and which page it is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    pub generation: u64,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    /// Reset and waiting for a fetch to be started.
    Pending,
    /// A bookmark-only fetch is parked until the bookmark set has loaded.
    Deferred(RequestTag),
    InFlight(RequestTag),
    Ready,
    /// The last fetch failed; whatever was loaded before is kept.
    Failed,
}

/// What presentation renders for the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    /// Unique by id, in the order the store returned them.
    pub items: Vec<ListableItem>,
    /// Last page successfully loaded (1 until the first fetch lands).
    pub page: u32,
    pub has_more: bool,
    pub phase: PagePhase,
    pub generation: u64,
}

impl PageState {
    fn new(generation: u64) -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: true,
            phase: PagePhase::Pending,
            generation,
        }
    }

    /// Nothing has been shown for the current state yet, or a fetch is running.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, PagePhase::Pending | PagePhase::Deferred(_) | PagePhase::InFlight(_))
    }

    pub fn fetch_in_flight(&self) -> bool {
        matches!(self.phase, PagePhase::Deferred(_) | PagePhase::InFlight(_))
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }
}

/// What a call to [`PageFetcher::fetch_page()`] or
/// [`PageFetcher::load_more()`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Records were fetched and merged. `count` is what the store returned,
    /// before deduplication.
    Loaded { page: u32, count: usize },
    /// Resolved empty without asking the store (bookmark-only with no
    /// session, or nothing bookmarked).
    Empty,
    /// Another fetch is in flight, or there's nothing more to load.
    Skipped,
    /// The page state was reset while this fetch was running.
    Stale,
    /// The store failed; previous items were kept.
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Current,
    Next,
}

pub struct PageFetcher {
    kind: CatalogKind,
    page_size: usize,
    store: StoreHandle,
    state: watch::Sender<PageState>,
}

impl PageFetcher {
    pub fn new(kind: CatalogKind, page_size: usize, store: StoreHandle) -> Self {
        Self {
            kind,
            page_size,
            store,
            state: watch::Sender::new(PageState::new(0)),
        }
    }

    pub fn state(&self) -> PageState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.state.subscribe()
    }

    /// Back to an empty first page, invalidating every fetch still running.
    /// Returns the new generation.
    pub fn reset(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = state.generation + 1;
            *state = PageState::new(generation);
        });
        tracing::debug!(kind = %self.kind, generation, "page state reset");
        generation
    }

    /// Fetch the current page under the current filter. A no-op while another
    /// fetch for the same state is running.
    pub async fn fetch_page(&self, filters: &FilterController, bookmarks: &BookmarkSync) -> FetchOutcome {
        self.fetch(Target::Current, filters, bookmarks).await
    }

    /// Fetch the page after the last one loaded. A no-op while loading, while
    /// a fetch is running, or once the store has run out of records.
    pub async fn load_more(&self, filters: &FilterController, bookmarks: &BookmarkSync) -> FetchOutcome {
        self.fetch(Target::Next, filters, bookmarks).await
    }

    #[instrument(skip(self, filters, bookmarks), fields(kind = %self.kind))]
    async fn fetch(&self, target: Target, filters: &FilterController, bookmarks: &BookmarkSync) -> FetchOutcome {
        let Some(tag) = self.begin(target) else {
            tracing::debug!(?target, "fetch skipped");
            return FetchOutcome::Skipped;
        };
        let filter = filters.current();
        let ids = if filter.bookmark_only {
            match self.bookmarked(tag, bookmarks).await {
                Ok(Some(ids)) => Some(ids),
                Ok(None) => return self.finish_empty(tag),
                Err(outcome) => return outcome,
            }
        } else {
            None
        };
        let query = self.listing_query(&filter, ids.as_deref(), tag.page);
        match self.store.query(&query).await.or_raise(|| ErrorKind::Store) {
            Ok(records) => self.commit(tag, records),
            Err(err) => self.fail(tag, err),
        }
    }

    /// Resolve the bookmark-only dimension: `Ok(None)` means the result is
    /// known to be empty. Waits (deferred) while the bookmark set is loading.
    async fn bookmarked(&self, tag: RequestTag, bookmarks: &BookmarkSync) -> std::result::Result<Option<Vec<ItemId>>, FetchOutcome> {
        loop {
            match bookmarks.membership() {
                Membership::SignedOut => return Ok(None),
                Membership::Loaded(ids) if ids.is_empty() => return Ok(None),
                Membership::Loaded(ids) => return Ok(Some(ids)),
                Membership::Loading => {
                    if !self.transition(tag, PagePhase::InFlight(tag), PagePhase::Deferred(tag)) {
                        return Err(self.stale(tag));
                    }
                    tracing::debug!(page = tag.page, "waiting for bookmarks");
                    bookmarks.wait_ready().await;
                    if !self.transition(tag, PagePhase::Deferred(tag), PagePhase::InFlight(tag)) {
                        return Err(self.stale(tag));
                    }
                },
            }
        }
    }

    /// Claim the in-flight guard and hand out the tag for this fetch.
    fn begin(&self, target: Target) -> Option<RequestTag> {
        let mut tag = None;
        self.state.send_if_modified(|state| {
            if state.fetch_in_flight() {
                return false;
            }
            let page = match target {
                Target::Current => state.page,
                Target::Next => {
                    let settled = matches!(state.phase, PagePhase::Ready | PagePhase::Failed);
                    if !settled || !state.has_more {
                        return false;
                    }
                    state.page + 1
                },
            };
            let claimed = RequestTag { generation: state.generation, page };
            state.phase = PagePhase::InFlight(claimed);
            tag = Some(claimed);
            true
        });
        tag
    }

    /// Move from one phase to another, but only if `tag` still owns the state.
    fn transition(&self, tag: RequestTag, from: PagePhase, to: PagePhase) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != tag.generation || state.phase != from {
                return false;
            }
            state.phase = to;
            true
        })
    }

    fn listing_query(&self, filter: &Filter, ids: Option<&[ItemId]>, page: u32) -> Query {
        let start = (page.max(1) as usize - 1) * self.page_size;
        let mut query = Query::table(self.kind.table())
            .order_by(self.kind.popularity_key(), Direction::Descending)
            .range(start..start + self.page_size);
        for condition in self.kind.listing_conditions(&today()) {
            query = query.filter(condition);
        }
        query = filter.narrow(self.kind, query);
        if let Some(ids) = ids {
            query = query.is_in("id", ids.iter().map(|id| id.0));
        }
        query
    }

    fn commit(&self, tag: RequestTag, records: Vec<curio_store::Record>) -> FetchOutcome {
        let count = records.len();
        let items = parse_items(self.kind, records);
        let page_size = self.page_size;
        let committed = self.state.send_if_modified(|state| {
            if state.generation != tag.generation || state.phase != PagePhase::InFlight(tag) {
                return false;
            }
            if tag.page == 1 {
                state.items.clear();
            }
            let mut seen: HashSet<ItemId> = state.items.iter().map(|item| item.id).collect();
            state.items.extend(items.into_iter().filter(|item| seen.insert(item.id)));
            state.page = tag.page;
            state.has_more = count == page_size;
            state.phase = PagePhase::Ready;
            true
        });
        if !committed {
            return self.stale(tag);
        }
        tracing::debug!(page = tag.page, count, "page loaded");
        FetchOutcome::Loaded { page: tag.page, count }
    }

    fn finish_empty(&self, tag: RequestTag) -> FetchOutcome {
        let committed = self.state.send_if_modified(|state| {
            if state.generation != tag.generation || state.phase != PagePhase::InFlight(tag) {
                return false;
            }
            if tag.page == 1 {
                state.items.clear();
            }
            state.has_more = false;
            state.phase = PagePhase::Ready;
            true
        });
        if !committed {
            return self.stale(tag);
        }
        FetchOutcome::Empty
    }

    fn fail(&self, tag: RequestTag, err: Error) -> FetchOutcome {
        let current = self.transition(tag, PagePhase::InFlight(tag), PagePhase::Failed);
        if !current {
            return self.stale(tag);
        }
        tracing::error!(page = tag.page, error = ?err, "failed to fetch page");
        FetchOutcome::Failed
    }

    fn stale(&self, tag: RequestTag) -> FetchOutcome {
        tracing::debug!(generation = tag.generation, page = tag.page, "discarding stale page response");
        FetchOutcome::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use crate::navigate::MemoryNavigator;
    use crate::notify::Recorder;
    use crate::session::Session;
    use curio_store::Condition;
    use curio_store::backend::{MockStore, Operation};
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct Harness {
        store: Arc<MockStore>,
        filters: FilterController,
        bookmarks: BookmarkSync,
        pages: PageFetcher,
    }

    impl Harness {
        fn new(store: MockStore, params: &[(&str, &str)]) -> Arc<Self> {
            Self::with_kind(CatalogKind::Exhibition, store, params)
        }

        fn with_kind(kind: CatalogKind, store: MockStore, params: &[(&str, &str)]) -> Arc<Self> {
            let store = Arc::new(store);
            let navigator = Arc::new(MemoryNavigator::with_params(params.iter().copied()));
            Arc::new(Self {
                filters: FilterController::new(kind, navigator, "isBookmark"),
                bookmarks: BookmarkSync::new(kind, store.clone(), Arc::new(Recorder::new())),
                pages: PageFetcher::new(kind, 5, store.clone()),
                store,
            })
        }

        async fn fetch_page(&self) -> FetchOutcome {
            self.pages.fetch_page(&self.filters, &self.bookmarks).await
        }

        async fn load_more(&self) -> FetchOutcome {
            self.pages.load_more(&self.filters, &self.bookmarks).await
        }

        fn ids(&self) -> Vec<i64> {
            self.pages.state().items.iter().map(|item| item.id.0).collect()
        }

        fn listing_queries(&self) -> usize {
            self.store.calls_on(Operation::Query, "exhibition") + self.store.calls_on(Operation::Query, "gallery")
        }

        fn last_listing_query(&self) -> Query {
            self.store.queries().into_iter().rev().find(|query| query.table != "bookmark").unwrap()
        }
    }

    fn exhibition(id: i64, reviews: i64, free: bool) -> Value {
        json!({
            "id": id,
            "name": format!("Exhibition {id}"),
            "review_count": reviews,
            "isFree": free,
            "end_date": "2099-12-31",
            "gallery": {"address": if id % 2 == 0 { "Seoul Mapo-gu" } else { "Busan Haeundae-gu" }},
        })
    }

    /// Eight galleries, most blogged first. None of them has a current end
    /// date, which galleries don't care about.
    fn galleries() -> Vec<Value> {
        (1..=8)
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("Gallery {id}"),
                    "blog_review_count": 100 - id,
                    "address": if id % 2 == 0 { "Seoul Jongno-gu" } else { "Busan Suyeong-gu" },
                    "isNow": id <= 4,
                    "isNew": id % 2 == 0,
                    "end_date": "2001-01-01",
                })
            })
            .collect()
    }

    /// Twelve free, current, gallery-backed exhibitions (ids 1..=12, most
    /// popular first), surrounded by rows that must never show up.
    fn catalog() -> MockStore {
        let mut rows: Vec<Value> = (1..=12).map(|id| exhibition(id, 500 - id * 10, true)).collect();
        rows.push(exhibition(20, 1000, false));
        rows.push(json!({"id": 21, "review_count": 999, "isFree": true, "end_date": "2001-01-01", "gallery": {"address": "Seoul"}}));
        rows.push(json!({"id": 22, "review_count": 998, "isFree": true, "end_date": "2099-12-31", "gallery": null}));
        MockStore::with_tables([("exhibition", rows)])
    }

    #[tokio::test]
    async fn test_free_category_pages_through_twelve() {
        let h = Harness::new(catalog(), &[]);
        assert!(h.filters.set_category(Category::Free).unwrap());

        assert_eq!(h.fetch_page().await, FetchOutcome::Loaded { page: 1, count: 5 });
        assert_eq!(h.ids(), vec![1, 2, 3, 4, 5]);
        assert!(h.pages.state().has_more);

        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 2, count: 5 });
        assert_eq!(h.ids(), (1..=10).collect::<Vec<_>>());
        assert_eq!(h.pages.state().page, 2);
        assert!(h.pages.state().has_more);

        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 3, count: 2 });
        assert_eq!(h.ids(), (1..=12).collect::<Vec<_>>());
        assert!(!h.pages.state().has_more);

        assert_eq!(h.load_more().await, FetchOutcome::Skipped);
        assert_eq!(h.listing_queries(), 3);
    }

    #[tokio::test]
    async fn test_listing_query_shape() {
        let h = Harness::new(catalog(), &[]);
        h.filters.set_category(Category::Free).unwrap();
        h.filters.set_region("Seoul");
        h.fetch_page().await;
        let query = h.store.queries().pop().unwrap();
        assert_eq!(query.table, "exhibition");
        assert_eq!(query.range, Some(0..5));
        assert_eq!(query.order.unwrap().field, "review_count");
        assert!(query.conditions.contains(&Condition::NotNull { field: "gallery".to_string() }));
        assert!(query.conditions.contains(&Condition::Eq { field: "isFree".to_string(), value: json!(true) }));
        assert!(query.conditions.iter().any(|c| matches!(c, Condition::AtLeast { field, .. } if field == "end_date")));
        assert!(
            query
                .conditions
                .contains(&Condition::Contains { field: "gallery.address".to_string(), needle: "Seoul".to_string() })
        );
        assert!(h.ids().iter().all(|id| id % 2 == 0));
    }

    #[tokio::test]
    async fn test_merge_drops_repeated_ids() {
        // Id 3 appears twice: once on the first page, once on the second.
        let mut rows: Vec<Value> = (1..=9).map(|id| exhibition(id, 500 - id * 10, true)).collect();
        rows.insert(7, exhibition(3, 405, true));
        let h = Harness::new(MockStore::with_tables([("exhibition", rows)]), &[]);
        h.fetch_page().await;
        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 2, count: 5 });
        let ids = h.ids();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(ids.len(), 9);
        // A full page came back, so there may be more even after dedup.
        assert!(h.pages.state().has_more);
    }

    #[tokio::test]
    async fn test_trailing_empty_page_after_exact_fit() {
        let rows: Vec<Value> = (1..=10).map(|id| exhibition(id, 500 - id * 10, true)).collect();
        let h = Harness::new(MockStore::with_tables([("exhibition", rows)]), &[]);
        h.fetch_page().await;
        h.load_more().await;
        assert!(h.pages.state().has_more);
        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 3, count: 0 });
        assert!(!h.pages.state().has_more);
        assert_eq!(h.ids().len(), 10);
    }

    #[tokio::test]
    async fn test_single_fetch_in_flight() {
        let h = Harness::new(catalog(), &[]);
        h.store.hold();
        let task = tokio::spawn({
            let h = h.clone();
            async move { h.fetch_page().await }
        });
        h.store.wait_for_calls(Operation::Query, 1).await;
        assert!(h.pages.state().fetch_in_flight());
        for _ in 0..3 {
            assert_eq!(h.load_more().await, FetchOutcome::Skipped);
        }
        assert_eq!(h.fetch_page().await, FetchOutcome::Skipped);
        h.store.release();
        assert_eq!(task.await.unwrap(), FetchOutcome::Loaded { page: 1, count: 5 });
        assert_eq!(h.store.peak_in_flight(), 1);
        assert_eq!(h.listing_queries(), 1);
    }

    #[tokio::test]
    async fn test_reset_discards_response_in_flight() {
        let h = Harness::new(catalog(), &[]);
        h.fetch_page().await;
        h.store.hold();
        let task = tokio::spawn({
            let h = h.clone();
            async move { h.load_more().await }
        });
        h.store.wait_for_calls(Operation::Query, 2).await;
        assert!(h.filters.set_region("Seoul"));
        h.pages.reset();
        let state = h.pages.state();
        assert!(state.items.is_empty());
        assert_eq!(state.page, 1);
        assert!(state.has_more);
        h.store.release();
        assert_eq!(task.await.unwrap(), FetchOutcome::Stale);
        let state = h.pages.state();
        assert!(state.items.is_empty());
        assert_eq!(state.phase, PagePhase::Pending);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_items() {
        let h = Harness::new(catalog(), &[]);
        h.filters.set_category(Category::Free).unwrap();
        h.fetch_page().await;
        h.store.fail_next(Operation::Query, 1);
        assert_eq!(h.load_more().await, FetchOutcome::Failed);
        let state = h.pages.state();
        assert_eq!(state.phase, PagePhase::Failed);
        assert_eq!(state.page, 1);
        assert_eq!(h.ids(), vec![1, 2, 3, 4, 5]);
        assert!(!state.is_loading());
        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 2, count: 5 });
    }

    #[tokio::test]
    async fn test_bookmark_only_without_session() {
        let h = Harness::new(catalog(), &[("isBookmark", "true")]);
        assert_eq!(h.fetch_page().await, FetchOutcome::Empty);
        let state = h.pages.state();
        assert!(state.items.is_empty());
        assert!(!state.has_more);
        assert_eq!(h.store.calls(Operation::Query), 0);
    }

    #[tokio::test]
    async fn test_bookmark_only_with_nothing_bookmarked() {
        let h = Harness::new(catalog(), &[("isBookmark", "1")]);
        h.bookmarks.set_session(Some(Session::new("u1")));
        h.bookmarks.load().await;
        assert_eq!(h.fetch_page().await, FetchOutcome::Empty);
        assert!(!h.pages.state().has_more);
        assert_eq!(h.listing_queries(), 0);
    }

    #[tokio::test]
    async fn test_bookmark_only_waits_for_bookmarks() {
        let rows: Vec<Value> = (1..=12).map(|id| exhibition(id, 500 - id * 10, true)).collect();
        let store = MockStore::with_tables([
            ("exhibition", rows),
            (
                "bookmark",
                vec![
                    json!({"id": 1, "user_id": "u1", "exhibition_id": 7}),
                    json!({"id": 2, "user_id": "u1", "exhibition_id": 2}),
                ],
            ),
        ]);
        let h = Harness::new(store, &[("isBookmark", "true")]);
        h.bookmarks.set_session(Some(Session::new("u1")));
        let task = tokio::spawn({
            let h = h.clone();
            async move { h.fetch_page().await }
        });
        let mut state = h.pages.subscribe();
        _ = state.wait_for(|state| matches!(state.phase, PagePhase::Deferred(_))).await;
        assert_eq!(h.fetch_page().await, FetchOutcome::Skipped);
        assert_eq!(h.listing_queries(), 0);

        h.bookmarks.load().await;
        assert_eq!(task.await.unwrap(), FetchOutcome::Loaded { page: 1, count: 2 });
        assert_eq!(h.ids(), vec![2, 7]);
        assert!(!h.pages.state().has_more);
        let query = h.store.queries().into_iter().find(|query| query.table == "exhibition").unwrap();
        assert!(query.conditions.contains(&Condition::In { field: "id".to_string(), values: vec![json!(2), json!(7)] }));
    }

    #[tokio::test]
    async fn test_page_of_malformed_records_does_not_stall() {
        // The five most popular rows have no id and are skipped on parse.
        let mut rows: Vec<Value> = (1..=5)
            .map(|n| json!({"name": "untitled", "review_count": 900 + n, "end_date": "2099-12-31", "gallery": {"address": "Seoul"}}))
            .collect();
        rows.extend((1..=3).map(|id| exhibition(id, 500 - id * 10, true)));
        let h = Harness::new(MockStore::with_tables([("exhibition", rows)]), &[]);

        assert_eq!(h.fetch_page().await, FetchOutcome::Loaded { page: 1, count: 5 });
        let state = h.pages.state();
        assert!(state.items.is_empty());
        assert!(state.has_more);
        assert!(!state.is_loading());

        assert_eq!(h.load_more().await, FetchOutcome::Loaded { page: 2, count: 3 });
        assert_eq!(h.ids(), vec![1, 2, 3]);
        assert!(!h.pages.state().has_more);
    }

    #[tokio::test]
    async fn test_load_more_waits_for_first_fetch() {
        let h = Harness::new(catalog(), &[]);
        assert_eq!(h.load_more().await, FetchOutcome::Skipped);
        assert_eq!(h.listing_queries(), 0);
    }

    #[rstest]
    #[case(Category::All, "", vec![1, 2, 3, 4, 5])]
    #[case(Category::Now, "", vec![1, 2, 3, 4])]
    #[case(Category::New, "seoul", vec![2, 4, 6, 8])]
    #[case(Category::Now, "SEOUL", vec![2, 4])]
    #[tokio::test]
    async fn test_gallery_listing(#[case] category: Category, #[case] region: &str, #[case] expected: Vec<i64>) {
        let h = Harness::with_kind(CatalogKind::Gallery, MockStore::with_tables([("gallery", galleries())]), &[]);
        h.filters.set_category(category).unwrap();
        h.filters.set_region(region);
        h.fetch_page().await;
        assert_eq!(h.ids(), expected);

        let query = h.last_listing_query();
        assert_eq!(query.table, "gallery");
        assert_eq!(query.order.unwrap().field, "blog_review_count");
        assert!(!query.conditions.iter().any(|c| matches!(c, Condition::AtLeast { .. } | Condition::NotNull { .. })));
        if let Some(flag) = category.flag() {
            assert!(query.conditions.contains(&Condition::Eq { field: flag.to_string(), value: json!(true) }));
        }
        if !region.is_empty() {
            assert!(
                query
                    .conditions
                    .contains(&Condition::Contains { field: "address".to_string(), needle: region.to_string() })
            );
        }
    }

    #[tokio::test]
    async fn test_gallery_rejects_exhibition_categories() {
        let h = Harness::with_kind(CatalogKind::Gallery, MockStore::with_tables([("gallery", galleries())]), &[]);
        assert!(h.filters.set_category(Category::Free).is_err());
        assert_eq!(h.filters.current().category, Category::All);
    }

    #[tokio::test]
    async fn test_gallery_bookmark_only() {
        let store = MockStore::with_tables([
            ("gallery", galleries()),
            (
                "bookmark",
                vec![
                    json!({"id": 1, "user_id": "u1", "gallery_id": 6, "exhibition_id": null}),
                    json!({"id": 2, "user_id": "u1", "gallery_id": 3, "exhibition_id": null}),
                    json!({"id": 3, "user_id": "u1", "gallery_id": null, "exhibition_id": 5}),
                ],
            ),
        ]);
        let h = Harness::with_kind(CatalogKind::Gallery, store, &[("isBookmark", "true")]);
        h.bookmarks.set_session(Some(Session::new("u1")));
        h.bookmarks.load().await;
        assert_eq!(h.fetch_page().await, FetchOutcome::Loaded { page: 1, count: 2 });
        assert_eq!(h.ids(), vec![3, 6]);
        let query = h.last_listing_query();
        assert_eq!(query.table, "gallery");
        assert!(query.conditions.contains(&Condition::In { field: "id".to_string(), values: vec![json!(3), json!(6)] }));
    }
}
