use crate::error::{Error, ErrorKind, Result};
use curio_store::{Condition, Record};
use derive_more::{Display, From};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;

/// Which catalog a [`Catalog`](crate::Catalog) browses.
///
/// Each kind fixes the table it reads, the column bookmarks reference it by,
/// the fields used for ordering and region matching, and which categories it
/// offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    #[display("exhibition")]
    Exhibition,
    #[display("gallery")]
    Gallery,
}

impl CatalogKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Exhibition => "exhibition",
            Self::Gallery => "gallery",
        }
    }

    /// Column of the `bookmark` table that holds this kind's item ids.
    pub fn bookmark_column(self) -> &'static str {
        match self {
            Self::Exhibition => "exhibition_id",
            Self::Gallery => "gallery_id",
        }
    }

    /// Listings are ordered by this field, most popular first.
    pub fn popularity_key(self) -> &'static str {
        match self {
            Self::Exhibition => "review_count",
            Self::Gallery => "blog_review_count",
        }
    }

    pub fn rating_key(self) -> &'static str {
        match self {
            Self::Exhibition => "review_average",
            Self::Gallery => "visitor_rating",
        }
    }

    /// Field matched against the region filter. Exhibitions don't carry an
    /// address of their own, only through the joined gallery.
    pub fn address_field(self) -> &'static str {
        match self {
            Self::Exhibition => "gallery.address",
            Self::Gallery => "address",
        }
    }

    pub fn categories(self) -> &'static [Category] {
        match self {
            Self::Exhibition => &[Category::All, Category::Free, Category::Recommended],
            Self::Gallery => &[Category::All, Category::Now, Category::New],
        }
    }

    pub fn supports(self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    /// Default size of the "featured" section.
    pub fn featured_limit(self) -> usize {
        match self {
            Self::Exhibition => 5,
            Self::Gallery => 10,
        }
    }

    /// Table holding visitor reviews of this kind's items, and the column
    /// referencing the item. Galleries aren't reviewed here.
    pub fn review_source(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Exhibition => Some(("exhibition_review", "exhibition_id")),
            Self::Gallery => None,
        }
    }

    /// Conditions every listing query carries: exhibitions must still be
    /// running (or upcoming) and be attached to a gallery.
    pub(crate) fn listing_conditions(self, today: &str) -> Vec<Condition> {
        match self {
            Self::Exhibition => vec![
                Condition::NotNull { field: "gallery".to_string() },
                Condition::AtLeast { field: "end_date".to_string(), value: today.into() },
            ],
            Self::Gallery => Vec::new(),
        }
    }
}

/// Listing tab. `All` adds no condition; every other category is a boolean
/// flag on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    All,
    Free,
    Recommended,
    Now,
    New,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Free => "free",
            Self::Recommended => "recommended",
            Self::Now => "now",
            Self::New => "new",
        }
    }

    /// Boolean field that must be `true` for an item to be in this category.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Free => Some("isFree"),
            Self::Recommended => Some("isRecommended"),
            Self::Now => Some("isNow"),
            Self::New => Some("isNew"),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "free" => Ok(Self::Free),
            "recommended" => Ok(Self::Recommended),
            "now" => Ok(Self::Now),
            "new" => Ok(Self::New),
            other => exn::bail!(ErrorKind::UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rating {
    pub average: f64,
    pub count: u64,
}

/// Running dates, as the store formats them (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Read-only view of one catalog record, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ListableItem {
    pub id: ItemId,
    pub name: String,
    pub headline: Option<String>,
    pub image: Option<String>,
    pub address: Option<String>,
    pub rating: Rating,
    pub period: Option<Period>,
    pub price: Option<i64>,
}

#[derive(Deserialize)]
struct ExhibitionRow {
    id: ItemId,
    name: Option<String>,
    contents: Option<String>,
    photo: Option<String>,
    price: Option<i64>,
    review_average: Option<f64>,
    review_count: Option<u64>,
    start_date: Option<String>,
    end_date: Option<String>,
    gallery: Option<JoinedGallery>,
}

#[derive(Deserialize)]
struct JoinedGallery {
    address: Option<String>,
}

#[derive(Deserialize)]
struct GalleryRow {
    id: ItemId,
    name: Option<String>,
    thumbnail: Option<String>,
    address: Option<String>,
    visitor_rating: Option<f64>,
    blog_review_count: Option<u64>,
}

impl From<ExhibitionRow> for ListableItem {
    fn from(row: ExhibitionRow) -> Self {
        let period = (row.start_date.is_some() || row.end_date.is_some())
            .then_some(Period { start: row.start_date, end: row.end_date });
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            headline: row.contents,
            image: row.photo,
            address: row.gallery.and_then(|gallery| gallery.address),
            rating: Rating {
                average: row.review_average.unwrap_or_default(),
                count: row.review_count.unwrap_or_default(),
            },
            period,
            price: row.price,
        }
    }
}

impl From<GalleryRow> for ListableItem {
    fn from(row: GalleryRow) -> Self {
        Self {
            id: row.id,
            name: row.name.unwrap_or_default(),
            headline: None,
            image: row.thumbnail,
            address: row.address,
            rating: Rating {
                average: row.visitor_rating.unwrap_or_default(),
                count: row.blog_review_count.unwrap_or_default(),
            },
            period: None,
            price: None,
        }
    }
}

impl ListableItem {
    pub fn from_record(kind: CatalogKind, record: Record) -> Result<Self> {
        let value = serde_json::Value::Object(record);
        let item = match kind {
            CatalogKind::Exhibition => serde_json::from_value::<ExhibitionRow>(value).map(Self::from),
            CatalogKind::Gallery => serde_json::from_value::<GalleryRow>(value).map(Self::from),
        };
        item.or_raise(|| ErrorKind::MalformedRecord(kind.table()))
    }
}

/// Parse a batch of records, dropping (and logging) the ones that don't fit.
pub(crate) fn parse_items(kind: CatalogKind, records: Vec<Record>) -> Vec<ListableItem> {
    records
        .into_iter()
        .filter_map(|record| match ListableItem::from_record(kind, record) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(%kind, error = ?err, "skipping malformed record");
                None
            },
        })
        .collect()
}

/// Today's date in the store's `YYYY-MM-DD` format.
pub(crate) fn today() -> String {
    OffsetDateTime::now_utc().date().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[rstest]
    #[case(CatalogKind::Exhibition, Category::Free, true)]
    #[case(CatalogKind::Exhibition, Category::Recommended, true)]
    #[case(CatalogKind::Exhibition, Category::Now, false)]
    #[case(CatalogKind::Gallery, Category::Now, true)]
    #[case(CatalogKind::Gallery, Category::New, true)]
    #[case(CatalogKind::Gallery, Category::Free, false)]
    #[case(CatalogKind::Gallery, Category::All, true)]
    fn test_supported_categories(#[case] kind: CatalogKind, #[case] category: Category, #[case] expected: bool) {
        assert_eq!(kind.supports(category), expected);
    }

    #[test]
    fn test_category_parse() {
        for category in [Category::All, Category::Free, Category::Recommended, Category::Now, Category::New] {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        let err = "popular".parse::<Category>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownCategory(c) if c == "popular"));
    }

    #[test]
    fn test_parse_exhibition() {
        let item = ListableItem::from_record(
            CatalogKind::Exhibition,
            record(json!({
                "id": 7,
                "name": "Modern Ink",
                "contents": "Ink paintings, 1950-1980",
                "photo": "https://img.example/7.jpg",
                "price": 15000,
                "review_average": 4.5,
                "review_count": 12,
                "start_date": "2026-09-01",
                "end_date": "2026-12-31",
                "gallery": {"name": "Hall A", "address": "Seoul Jongno-gu"},
                "isFree": false
            })),
        )
        .unwrap();
        assert_eq!(item.id, ItemId(7));
        assert_eq!(item.address.as_deref(), Some("Seoul Jongno-gu"));
        assert_eq!(item.rating, Rating { average: 4.5, count: 12 });
        assert_eq!(item.period.unwrap().end.as_deref(), Some("2026-12-31"));
    }

    #[test]
    fn test_parse_gallery_with_gaps() {
        let item = ListableItem::from_record(CatalogKind::Gallery, record(json!({"id": 3, "visitor_rating": null}))).unwrap();
        assert_eq!(item.name, "");
        assert_eq!(item.rating, Rating::default());
        assert!(item.period.is_none());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let rows = vec![
            record(json!({"id": 1})),
            record(json!({"name": "no id"})),
            record(json!({"id": "two"})),
            record(json!({"id": 3})),
        ];
        let items = parse_items(CatalogKind::Gallery, rows);
        assert_eq!(items.iter().map(|item| item.id).collect::<Vec<_>>(), vec![ItemId(1), ItemId(3)]);
    }

    #[test]
    fn test_listing_conditions() {
        assert_eq!(CatalogKind::Gallery.listing_conditions("2026-10-17"), vec![]);
        let conditions = CatalogKind::Exhibition.listing_conditions("2026-10-17");
        assert!(conditions.contains(&Condition::NotNull { field: "gallery".to_string() }));
        assert!(conditions.contains(&Condition::AtLeast { field: "end_date".to_string(), value: json!("2026-10-17") }));
    }

    #[test]
    fn test_today_format() {
        let today = today();
        assert_eq!(today.len(), 10);
        assert_eq!(today.as_bytes()[4], b'-');
    }
}
