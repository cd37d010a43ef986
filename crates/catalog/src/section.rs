//! One-shot sections ("featured", "top-rated") that load on their own,
//! concurrently with the listing and independently of the filter.

use crate::error::ErrorKind;
use crate::model::{CatalogKind, ListableItem, parse_items};
use crate::settings::Settings;
use curio_store::{Direction, Query, StoreHandle};
use derive_more::Display;
use exn::ResultExt;
use tokio::sync::watch;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SectionKind {
    #[display("featured")]
    Featured,
    #[display("top-rated")]
    TopRated,
}

/// A named, fixed query.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub section: SectionKind,
    pub query: Query,
}

impl SectionSpec {
    /// Recommended items. Gallery picks are ordered by popularity; exhibition
    /// picks come in store order.
    pub fn featured(settings: &Settings, today: &str) -> Self {
        let kind = settings.kind;
        let mut query = Query::table(kind.table()).eq("isRecommended", true);
        query = match kind {
            CatalogKind::Exhibition => query.at_least("end_date", today),
            CatalogKind::Gallery => query.order_by(kind.popularity_key(), Direction::Descending),
        };
        Self {
            section: SectionKind::Featured,
            query: query.limit(settings.featured_limit),
        }
    }

    /// Best rated items first.
    pub fn top_rated(settings: &Settings, today: &str) -> Self {
        let kind = settings.kind;
        let mut query = Query::table(kind.table());
        for condition in kind.listing_conditions(today) {
            query = query.filter(condition);
        }
        Self {
            section: SectionKind::TopRated,
            query: query.order_by(kind.rating_key(), Direction::Descending).limit(settings.top_rated_limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionState {
    Idle,
    Loading,
    Ready(Vec<ListableItem>),
    Failed,
}

impl SectionState {
    pub fn items(&self) -> &[ListableItem] {
        match self {
            Self::Ready(items) => items,
            Self::Idle | Self::Loading | Self::Failed => &[],
        }
    }
}

pub struct SectionLoader {
    kind: CatalogKind,
    spec: SectionSpec,
    store: StoreHandle,
    state: watch::Sender<SectionState>,
}

impl SectionLoader {
    pub fn new(kind: CatalogKind, spec: SectionSpec, store: StoreHandle) -> Self {
        Self {
            kind,
            spec,
            store,
            state: watch::Sender::new(SectionState::Idle),
        }
    }

    pub fn spec(&self) -> &SectionSpec {
        &self.spec
    }

    pub fn state(&self) -> SectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SectionState> {
        self.state.subscribe()
    }

    /// Load the section unless it's already loading or holds data. Returns
    /// whether a request was made. A section that came back empty (or
    /// failed) may load again.
    #[instrument(skip(self), fields(kind = %self.kind, section = %self.spec.section))]
    pub async fn load(&self) -> bool {
        let claimed = self.state.send_if_modified(|state| {
            let busy = match state {
                SectionState::Loading => true,
                SectionState::Ready(items) => !items.is_empty(),
                SectionState::Idle | SectionState::Failed => false,
            };
            if !busy {
                *state = SectionState::Loading;
            }
            !busy
        });
        if !claimed {
            return false;
        }
        let next = match self.store.query(&self.spec.query).await.or_raise(|| ErrorKind::Store) {
            Ok(records) => SectionState::Ready(parse_items(self.kind, records)),
            Err(err) => {
                tracing::error!(error = ?err, "failed to load section");
                SectionState::Failed
            },
        };
        self.state.send_replace(next);
        true
    }
}
