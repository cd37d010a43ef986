use crate::bookmark::{BookmarkSet, BookmarkSync, SyncPhase, ToggleOutcome};
use crate::detail::DetailLoader;
use crate::error::Result;
use crate::filter::{Filter, FilterController};
use crate::model::{CatalogKind, Category, ItemId, ListableItem, today};
use crate::navigate::{MemoryNavigator, Navigator};
use crate::notify::{Notifier, TracingNotifier};
use crate::page::{FetchOutcome, PageFetcher, PageState};
use crate::section::{SectionKind, SectionLoader, SectionSpec, SectionState};
use crate::session::Session;
use crate::settings::Settings;
use curio_asyncutils::Debouncer;
use curio_store::StoreHandle;
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    settings: Settings,
    store: StoreHandle,
    filters: FilterController,
    pages: PageFetcher,
    bookmarks: BookmarkSync,
    featured: SectionLoader,
    top_rated: SectionLoader,
    debouncer: Debouncer,
}

/// One browsable catalog: filters, the paginated listing, the bookmark
/// overlay and the standalone sections, wired together.
///
/// Cheap to clone; clones share state. Filter setters reset the listing
/// synchronously and schedule a debounced fetch, so a burst of changes
/// results in a single request for the final selection.
///
/// Must be used from within a tokio runtime.
///
/// # Examples
///
/// ```
/// use curio_catalog::{Catalog, CatalogKind, Category};
/// use curio_store::StoreHandle;
///
/// # async fn example(store: StoreHandle) -> curio_catalog::error::Result<()> {
/// let catalog = Catalog::builder(CatalogKind::Exhibition, store).build()?;
/// catalog.mount(None);
/// catalog.set_category(Category::Free)?;
/// catalog.settled().await;
/// for item in catalog.page().items {
///     println!("{} ({} reviews)", item.name, item.rating.count);
/// }
/// catalog.load_more().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<Inner>,
}

pub struct CatalogBuilder {
    settings: Settings,
    store: StoreHandle,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl CatalogBuilder {
    /// Replace the default settings for the kind (the kind included).
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn build(self) -> Result<Catalog> {
        let Self { settings, store, notifier, navigator } = self;
        settings.validate()?;
        let kind = settings.kind;
        let today = today();
        let inner = Inner {
            filters: FilterController::new(kind, navigator, settings.bookmark_param.as_str()),
            pages: PageFetcher::new(kind, settings.page_size, store.clone()),
            bookmarks: BookmarkSync::new(kind, store.clone(), notifier),
            featured: SectionLoader::new(kind, SectionSpec::featured(&settings, &today), store.clone()),
            top_rated: SectionLoader::new(kind, SectionSpec::top_rated(&settings, &today), store.clone()),
            store,
            debouncer: Debouncer::new(settings.debounce),
            settings,
        };
        Ok(Catalog { inner: Arc::new(inner) })
    }
}

impl Catalog {
    /// Defaults: [`Settings::new(kind)`](Settings::new), notifications to
    /// `tracing`, and a URL that starts out empty.
    pub fn builder(kind: CatalogKind, store: StoreHandle) -> CatalogBuilder {
        CatalogBuilder {
            settings: Settings::new(kind),
            store,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(MemoryNavigator::new()),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.inner.settings.kind
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Kick off everything a freshly shown catalog loads: both sections, the
    /// bookmark set (with a session), and the first page. Returns without
    /// waiting for any of it.
    pub fn mount(&self, session: Option<Session>) {
        tracing::debug!(kind = %self.kind(), signed_in = session.is_some(), "mounting catalog");
        for section in [SectionKind::Featured, SectionKind::TopRated] {
            let catalog = self.clone();
            tokio::spawn(async move {
                catalog.loader(section).load().await;
            });
        }
        if let Some(session) = session {
            self.inner.bookmarks.set_session(Some(session));
            self.load_bookmarks();
        }
        self.schedule();
    }

    pub fn filter(&self) -> Filter {
        self.inner.filters.current()
    }

    pub fn subscribe_filter(&self) -> watch::Receiver<Filter> {
        self.inner.filters.subscribe()
    }

    pub fn page(&self) -> PageState {
        self.inner.pages.state()
    }

    pub fn subscribe_page(&self) -> watch::Receiver<PageState> {
        self.inner.pages.subscribe()
    }

    pub fn bookmarks(&self) -> BookmarkSet {
        self.inner.bookmarks.snapshot()
    }

    pub fn subscribe_bookmarks(&self) -> watch::Receiver<BookmarkSet> {
        self.inner.bookmarks.subscribe()
    }

    pub fn bookmark_phase(&self) -> SyncPhase {
        self.inner.bookmarks.phase()
    }

    pub fn section(&self, section: SectionKind) -> SectionState {
        self.loader(section).state()
    }

    pub fn subscribe_section(&self, section: SectionKind) -> watch::Receiver<SectionState> {
        self.loader(section).subscribe()
    }

    /// Fails if the catalog kind doesn't offer `category`. Returns whether
    /// the filter changed.
    pub fn set_category(&self, category: Category) -> Result<bool> {
        let changed = self.inner.filters.set_category(category)?;
        if changed {
            self.restart();
        }
        Ok(changed)
    }

    pub fn set_region(&self, region: impl Into<String>) -> bool {
        let changed = self.inner.filters.set_region(region);
        if changed {
            self.restart();
        }
        changed
    }

    pub fn set_bookmark_only(&self, bookmark_only: bool) -> bool {
        let changed = self.inner.filters.set_bookmark_only(bookmark_only);
        if changed {
            self.restart();
        }
        changed
    }

    pub async fn fetch_page(&self) -> FetchOutcome {
        self.inner.pages.fetch_page(&self.inner.filters, &self.inner.bookmarks).await
    }

    pub async fn load_more(&self) -> FetchOutcome {
        self.inner.pages.load_more(&self.inner.filters, &self.inner.bookmarks).await
    }

    pub fn is_bookmarked(&self, item: ItemId) -> bool {
        self.inner.bookmarks.is_bookmarked(item)
    }

    /// Toggle the bookmark on `item`. With the bookmark-only filter active, a
    /// committed change also restarts the listing.
    pub async fn toggle_bookmark(&self, item: &ListableItem) -> ToggleOutcome {
        let outcome = self.inner.bookmarks.toggle(item).await;
        if outcome.committed() && self.filter().bookmark_only {
            self.restart();
        }
        outcome
    }

    /// Detail view of one item of this catalog's kind. Nothing is fetched
    /// until [`DetailLoader::load()`] is called.
    pub fn detail(&self, id: ItemId) -> DetailLoader {
        DetailLoader::new(self.kind(), id, self.inner.store.clone())
    }

    /// [`toggle_bookmark()`](Self::toggle_bookmark) for the item shown in a
    /// detail view. `None` while the item hasn't loaded.
    pub async fn toggle_detail(&self, detail: &DetailLoader) -> Option<ToggleOutcome> {
        let item = detail.listable()?;
        Some(self.toggle_bookmark(&item).await)
    }

    pub fn sign_in(&self, session: Session) {
        self.inner.bookmarks.set_session(Some(session));
        if self.filter().bookmark_only {
            self.restart();
        }
        self.load_bookmarks();
    }

    pub fn sign_out(&self) {
        self.inner.bookmarks.clear();
        if self.filter().bookmark_only {
            self.restart();
        }
    }

    /// Resolves once nothing is pending: no debounce timer waiting, no page
    /// fetch running, bookmarks and sections not loading. Only meaningful
    /// after [`mount()`](Self::mount), since an unmounted catalog stays
    /// pending forever.
    pub async fn settled(&self) {
        let mut pages = self.inner.pages.subscribe();
        let mut bookmarks = self.inner.bookmarks.subscribe_phase();
        let mut featured = self.inner.featured.subscribe();
        let mut top_rated = self.inner.top_rated.subscribe();
        loop {
            while self.inner.debouncer.is_pending() {
                tokio::time::sleep(self.inner.debouncer.delay()).await;
            }
            // Senders live in `self.inner`, so none of these can fail.
            _ = bookmarks.wait_for(|phase| phase.is_settled()).await;
            _ = featured.wait_for(|state| *state != SectionState::Loading).await;
            _ = top_rated.wait_for(|state| *state != SectionState::Loading).await;
            _ = pages.wait_for(|state| !state.is_loading()).await;
            if !self.inner.debouncer.is_pending() {
                return;
            }
        }
    }

    fn loader(&self, section: SectionKind) -> &SectionLoader {
        match section {
            SectionKind::Featured => &self.inner.featured,
            SectionKind::TopRated => &self.inner.top_rated,
        }
    }

    fn load_bookmarks(&self) {
        let catalog = self.clone();
        tokio::spawn(async move {
            catalog.inner.bookmarks.load().await;
        });
    }

    /// Reset the listing now, fetch once things have been quiet for a while.
    fn restart(&self) {
        self.inner.pages.reset();
        self.schedule();
    }

    fn schedule(&self) {
        // Weak, so a pending timer doesn't keep a dropped catalog alive.
        let inner = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(async move {
            if let Some(inner) = inner.upgrade() {
                Catalog { inner }.fetch_page().await;
            }
        });
    }
}
