//! Cursor pagination state for the infinite-scroll grid.
use crate::catalog::{ContentRecord, OrderField, PageCursor};

/// A page fetch the pager has committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub start_after: Option<PageCursor>,
}

/// What applying a page response did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Records were appended; more pages may follow.
    Appended(usize),
    /// The page was empty; the cursor is cleared.
    Exhausted,
    /// The fetch failed; the cursor is kept so the next scroll retries.
    Failed,
    /// The response belongs to a superseded query and was dropped.
    Stale,
}

/// Accumulated grid items plus the cursor and in-flight guard.
///
/// `generation` increases on every new query. Responses carry the generation
/// they were requested under and anything older is discarded.
#[derive(Debug, Clone)]
pub struct Pager {
    items: Vec<ContentRecord>,
    cursor: Option<PageCursor>,
    in_flight: bool,
    generation: u64,
    order: OrderField,
}

impl Pager {
    pub fn new(order: OrderField) -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            in_flight: false,
            generation: 0,
            order,
        }
    }

    /// Commit to fetching a page.
    ///
    /// A new query clears items and cursor and supersedes any outstanding
    /// fetch. A continuation while a fetch is outstanding returns `None`.
    pub fn begin(&mut self, is_new_query: bool) -> Option<PageRequest> {
        if is_new_query {
            self.generation += 1;
            self.items.clear();
            self.cursor = None;
        } else if self.in_flight {
            return None;
        }

        self.in_flight = true;
        Some(PageRequest {
            generation: self.generation,
            start_after: self.cursor.clone(),
        })
    }

    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<ContentRecord>, String>,
    ) -> PageOutcome {
        if generation != self.generation {
            return PageOutcome::Stale;
        }
        self.in_flight = false;

        match result {
            Ok(records) => match records.last() {
                None => {
                    self.cursor = None;
                    PageOutcome::Exhausted
                }
                Some(last) => {
                    self.cursor = PageCursor::after(last, self.order);
                    let count = records.len();
                    self.items.extend(records);
                    PageOutcome::Appended(count)
                }
            },
            Err(_) => PageOutcome::Failed,
        }
    }

    pub fn items(&self) -> &[ContentRecord] {
        &self.items
    }

    pub fn cursor(&self) -> Option<&PageCursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentKind;
    use chrono::{TimeZone, Utc};

    fn page(ids: &[&str]) -> Vec<ContentRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let mut record = ContentRecord::new(*id, *id, ContentKind::Movie);
                record.published_at = Utc.timestamp_millis_opt(10_000 - i as i64).single();
                record
            })
            .collect()
    }

    #[test]
    fn test_continuation_while_in_flight_is_noop() {
        let mut pager = Pager::new(OrderField::PublishedAt);
        assert!(pager.begin(true).is_some());
        assert_eq!(pager.begin(false), None);
        assert!(pager.is_loading());
    }

    #[test]
    fn test_append_sets_cursor_to_last() {
        let mut pager = Pager::new(OrderField::PublishedAt);
        let req = pager.begin(true).unwrap();
        assert_eq!(req.start_after, None);

        let outcome = pager.complete(req.generation, Ok(page(&["a", "b"])));
        assert_eq!(outcome, PageOutcome::Appended(2));
        assert_eq!(pager.cursor().map(|c| c.id()), Some("b"));
        assert!(!pager.is_loading());

        let next = pager.begin(false).unwrap();
        assert_eq!(next.start_after.as_ref().map(|c| c.id()), Some("b"));
    }

    #[test]
    fn test_empty_page_clears_cursor() {
        let mut pager = Pager::new(OrderField::PublishedAt);
        let req = pager.begin(true).unwrap();
        pager.complete(req.generation, Ok(page(&["a"])));
        let req = pager.begin(false).unwrap();

        assert_eq!(pager.complete(req.generation, Ok(Vec::new())), PageOutcome::Exhausted);
        assert!(!pager.has_more());
        assert_eq!(pager.items().len(), 1);
    }

    #[test]
    fn test_failure_keeps_cursor() {
        let mut pager = Pager::new(OrderField::PublishedAt);
        let req = pager.begin(true).unwrap();
        pager.complete(req.generation, Ok(page(&["a"])));
        let req = pager.begin(false).unwrap();

        assert_eq!(pager.complete(req.generation, Err("offline".into())), PageOutcome::Failed);
        assert!(pager.has_more());
        assert!(!pager.is_loading());
    }

    #[test]
    fn test_new_query_supersedes_outstanding() {
        let mut pager = Pager::new(OrderField::PublishedAt);
        let first = pager.begin(true).unwrap();
        pager.complete(first.generation, Ok(page(&["a"])));
        let old = pager.begin(false).unwrap();

        let fresh = pager.begin(true).unwrap();
        assert!(pager.items().is_empty());
        assert_eq!(fresh.start_after, None);

        assert_eq!(pager.complete(old.generation, Ok(page(&["x"]))), PageOutcome::Stale);
        assert!(pager.items().is_empty());
        assert!(pager.is_loading());

        assert_eq!(pager.complete(fresh.generation, Ok(page(&["b"]))), PageOutcome::Appended(1));
        assert_eq!(pager.items()[0].id, "b");
    }
}
