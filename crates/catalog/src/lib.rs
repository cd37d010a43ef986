//! Discovery engine behind browsable catalogs of exhibitions and galleries.
//!
//! A [`Catalog`] ties together four independently testable parts:
//!
//! - [`FilterController`]: the current category / region / bookmark-only
//!   selection.
//! - [`PageFetcher`]: page-sized requests, merging and deduplication, and the
//!   request tags that let stale responses be thrown away.
//! - [`BookmarkSync`]: the signed-in user's bookmark set, with optimistic
//!   add/remove and rollback.
//! - [`SectionLoader`]: one-shot widgets ("featured", "top-rated") that load
//!   on their own and never take part in filter resets.
//!
//! [`DetailLoader`] covers the single-item view (record, reviews, gallery
//! notices), sharing the catalog's store and bookmark set.
//!
//! All observable state is published through `tokio::sync::watch` channels;
//! presentation subscribes and renders, it never mutates.

mod bookmark;
mod catalog;
mod detail;
pub mod error;
mod filter;
mod model;
mod navigate;
mod notify;
mod page;
mod section;
mod session;
mod settings;

pub use crate::bookmark::{Bookmark, BookmarkSet, BookmarkSync, SyncPhase, ToggleOutcome};
pub use crate::catalog::{Catalog, CatalogBuilder};
pub use crate::detail::{DetailLoader, ItemDetail, Loadable, Notice, Review};
pub use crate::filter::{Filter, FilterController};
pub use crate::model::{CatalogKind, Category, ItemId, ListableItem, Period, Rating};
pub use crate::navigate::{MemoryNavigator, Navigator};
pub use crate::notify::{Notification, Notifier, Recorder, Severity, TracingNotifier};
pub use crate::page::{FetchOutcome, PageFetcher, PagePhase, PageState, RequestTag};
pub use crate::section::{SectionKind, SectionLoader, SectionSpec, SectionState};
pub use crate::session::{Session, UserId};
pub use crate::settings::{BOOKMARK_PARAM, DEBOUNCE, PAGE_SIZE, Settings, TOP_RATED_LIMIT};
