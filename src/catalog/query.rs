//! Store-agnostic description of a catalog query.
//!
//! Mirrors the capabilities the hosted document store offers: equality
//! filters, array membership (single value or any-of), one order-by field,
//! a limit, and "start after" a previously returned record.
use super::model::{ContentKind, ContentRecord};

/// Field a query can be ordered by.
///
/// Records with no value for the field (a null `published_at`) are excluded
/// from queries ordered by it, the way the hosted store drops documents that
/// lack the ordered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    PublishedAt,
    PopularityRank,
    SeasonNumber,
    Year,
}

impl OrderField {
    /// Value of this field for a record, as used by cursors.
    pub fn value_of(&self, record: &ContentRecord) -> Option<i64> {
        match self {
            OrderField::PublishedAt => record.published_at.map(|t| t.timestamp_millis()),
            OrderField::PopularityRank => Some(record.popularity_rank),
            OrderField::SeasonNumber => Some(record.season_number),
            OrderField::Year => Some(record.year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    KindEq(ContentKind),
    SeriesTitleEq(String),
    SagaEq(String),
    /// `categories` contains this tag.
    CategoryContains(String),
    /// `categories` contains at least one of these tags.
    CategoryContainsAny(Vec<String>),
    PopularityAbove(i64),
}

/// Opaque marker for the last record of the previous page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub(crate) sort_value: i64,
    pub(crate) id: String,
}

impl PageCursor {
    /// Cursor pointing after `record` in a query ordered by `field`.
    ///
    /// Returns `None` when the record has no value for the field, which cannot
    /// happen for records returned by a query ordered on that field.
    pub fn after(record: &ContentRecord, field: OrderField) -> Option<Self> {
        field.value_of(record).map(|sort_value| Self {
            sort_value,
            id: record.id.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentQuery {
    pub filters: Vec<Filter>,
    pub order: Option<(OrderField, Direction)>,
    pub limit: Option<u32>,
    pub start_after: Option<PageCursor>,
}

impl ContentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: OrderField, direction: Direction) -> Self {
        self.order = Some((field, direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue after `cursor`. Ignored by stores when the query has no order.
    pub fn start_after(mut self, cursor: Option<PageCursor>) -> Self {
        self.start_after = cursor;
        self
    }

    /// Newest first, the ordering every grid page and the new-releases row use.
    pub fn newest(limit: u32) -> Self {
        Self::new()
            .order_by(OrderField::PublishedAt, Direction::Descending)
            .limit(limit)
    }

    /// Trending row: ranked records only, rank 1 first.
    pub fn trending(limit: u32) -> Self {
        Self::new()
            .filter(Filter::PopularityAbove(0))
            .order_by(OrderField::PopularityRank, Direction::Ascending)
            .limit(limit)
    }
}
