//! Reordering batched id lookups to match the list they came from.
use std::collections::HashMap;

use crate::catalog::ContentRecord;

/// Arrange `records` in the order of `ids`.
///
/// Ids with no matching record are dropped. A repeated id yields its record
/// once, at its first position.
pub fn order_by_ids(ids: &[String], records: Vec<ContentRecord>) -> Vec<ContentRecord> {
    let mut by_id: HashMap<String, ContentRecord> = records
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
