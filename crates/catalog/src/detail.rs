//! Detail view of a single item: the record itself, its reviews and its
//! gallery's notices. Each part loads once, on its own; the notices wait for
//! the item because that's where the gallery reference comes from.

use crate::error::{Error, ErrorKind, Result};
use crate::model::{CatalogKind, ItemId, ListableItem};
use curio_store::{Direction, Query, Record, StoreHandle};
use exn::ResultExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tokio::sync::watch;
use tracing::instrument;

pub(crate) const NOTICE_TABLE: &str = "gallery_notification";

/// Everything the detail view shows about the item itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetail {
    pub item: ListableItem,
    /// Free-form visiting information.
    pub info: Option<String>,
    /// Number of reviews per star rating, five stars first.
    pub breakdown: [u64; 5],
    pub gallery_name: Option<String>,
    /// Key the gallery's notices are filed under.
    pub gallery_url: Option<String>,
}

#[derive(Deserialize)]
struct DetailRow {
    name: Option<String>,
    url: Option<String>,
    add_info: Option<String>,
    review_5_count: Option<u64>,
    review_4_count: Option<u64>,
    review_3_count: Option<u64>,
    review_2_count: Option<u64>,
    review_1_count: Option<u64>,
    gallery: Option<LinkedGallery>,
}

#[derive(Deserialize)]
struct LinkedGallery {
    name: Option<String>,
    url: Option<String>,
}

impl ItemDetail {
    pub fn from_record(kind: CatalogKind, record: Record) -> Result<Self> {
        let row: DetailRow =
            serde_json::from_value(Value::Object(record.clone())).or_raise(|| ErrorKind::MalformedRecord(kind.table()))?;
        let item = ListableItem::from_record(kind, record)?;
        let (gallery_name, gallery_url) = match kind {
            CatalogKind::Exhibition => row.gallery.map(|gallery| (gallery.name, gallery.url)).unwrap_or_default(),
            CatalogKind::Gallery => (row.name, row.url),
        };
        let breakdown = [
            row.review_5_count,
            row.review_4_count,
            row.review_3_count,
            row.review_2_count,
            row.review_1_count,
        ]
        .map(|count| count.unwrap_or_default());
        Ok(Self {
            item,
            info: row.add_info,
            breakdown,
            gallery_name,
            gallery_url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Review {
    pub id: Option<i64>,
    pub title: Option<String>,
    #[serde(rename = "description")]
    pub body: Option<String>,
    pub rating: Option<f64>,
    #[serde(rename = "name")]
    pub author: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Notice {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Idle,
    Loading,
    Ready(T),
    Failed,
}

impl<T> Loadable<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Idle | Self::Loading | Self::Failed => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

pub struct DetailLoader {
    kind: CatalogKind,
    id: ItemId,
    store: StoreHandle,
    item: watch::Sender<Loadable<Option<ItemDetail>>>,
    reviews: watch::Sender<Loadable<Vec<Review>>>,
    notices: watch::Sender<Loadable<Vec<Notice>>>,
}

impl DetailLoader {
    pub fn new(kind: CatalogKind, id: ItemId, store: StoreHandle) -> Self {
        Self {
            kind,
            id,
            store,
            item: watch::Sender::new(Loadable::Idle),
            reviews: watch::Sender::new(Loadable::Idle),
            notices: watch::Sender::new(Loadable::Idle),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// `Ready(None)` when the store has no such item.
    pub fn item(&self) -> Loadable<Option<ItemDetail>> {
        self.item.borrow().clone()
    }

    pub fn subscribe_item(&self) -> watch::Receiver<Loadable<Option<ItemDetail>>> {
        self.item.subscribe()
    }

    /// The item as listings show it, once loaded.
    pub fn listable(&self) -> Option<ListableItem> {
        match &*self.item.borrow() {
            Loadable::Ready(Some(detail)) => Some(detail.item.clone()),
            _ => None,
        }
    }

    pub fn reviews(&self) -> Loadable<Vec<Review>> {
        self.reviews.borrow().clone()
    }

    pub fn subscribe_reviews(&self) -> watch::Receiver<Loadable<Vec<Review>>> {
        self.reviews.subscribe()
    }

    /// Newest first.
    pub fn notices(&self) -> Loadable<Vec<Notice>> {
        self.notices.borrow().clone()
    }

    pub fn subscribe_notices(&self) -> watch::Receiver<Loadable<Vec<Notice>>> {
        self.notices.subscribe()
    }

    /// Load every part that isn't loaded or loading yet. Parts that failed
    /// are tried again.
    #[instrument(skip(self), fields(kind = %self.kind, id = %self.id))]
    pub async fn load(&self) {
        tokio::join!(self.load_item_and_notices(), self.load_reviews());
    }

    async fn load_item_and_notices(&self) {
        once(&self.item, "item", async {
            let query = Query::table(self.kind.table()).eq("id", self.id.0).limit(1);
            let records = self.store.query(&query).await.or_raise(|| ErrorKind::Store)?;
            let detail = records.into_iter().next().map(|record| ItemDetail::from_record(self.kind, record)).transpose()?;
            Ok::<_, Error>(detail)
        })
        .await;
        let source = match &*self.item.borrow() {
            Loadable::Ready(detail) => Some(detail.as_ref().and_then(|detail| detail.gallery_url.clone())),
            Loadable::Idle | Loadable::Loading | Loadable::Failed => None,
        };
        // Without the item there's no telling whose notices to load.
        let Some(url) = source else {
            return;
        };
        once(&self.notices, "notices", async {
            let Some(url) = url else {
                return Ok(Vec::new());
            };
            let query = Query::table(NOTICE_TABLE)
                .eq("naver_gallery_url", url)
                .order_by("created_at", Direction::Descending);
            let records = self.store.query(&query).await.or_raise(|| ErrorKind::Store)?;
            Ok::<_, Error>(parse_rows(NOTICE_TABLE, records))
        })
        .await;
    }

    async fn load_reviews(&self) {
        once(&self.reviews, "reviews", async {
            let Some((table, column)) = self.kind.review_source() else {
                return Ok(Vec::new());
            };
            let query = Query::table(table).eq(column, self.id.0);
            let records = self.store.query(&query).await.or_raise(|| ErrorKind::Store)?;
            Ok::<_, Error>(parse_rows(table, records))
        })
        .await;
    }
}

/// Run `fetch` into `state` unless it's already loading or loaded.
async fn once<T, F>(state: &watch::Sender<Loadable<T>>, part: &'static str, fetch: F)
where
    F: Future<Output = Result<T>>,
{
    let claimed = state.send_if_modified(|state| {
        let claim = matches!(state, Loadable::Idle | Loadable::Failed);
        if claim {
            *state = Loadable::Loading;
        }
        claim
    });
    if !claimed {
        return;
    }
    let next = match fetch.await {
        Ok(value) => Loadable::Ready(value),
        Err(err) => {
            tracing::error!(part, error = ?err, "failed to load item detail");
            Loadable::Failed
        },
    };
    state.send_replace(next);
}

fn parse_rows<T: DeserializeOwned>(table: &'static str, records: Vec<Record>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(Value::Object(record)) {
            Ok(row) => Some(row),
            Err(err) => {
                tracing::warn!(table, error = %err, "skipping malformed record");
                None
            },
        })
        .collect()
}
