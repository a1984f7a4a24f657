//! Deletion history retention.

use crate::document::HistoryEntry;
use chrono::{DateTime, Duration, Utc};

pub const HISTORY_TTL_DAYS: i64 = 30;
pub const HISTORY_MAX_ITEMS: usize = 200;

/// Drops entries deleted more than [`HISTORY_TTL_DAYS`] before `now`, then
/// keeps only the newest [`HISTORY_MAX_ITEMS`] (the tail of the list).
///
/// Entries without a readable `deletedAt` are kept. Returns how many entries
/// were removed.
pub fn prune_history(entries: &mut Vec<HistoryEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    let cutoff = (now - Duration::days(HISTORY_TTL_DAYS)).timestamp_millis();

    entries.retain(|entry| {
        entry
            .deleted_at
            .as_ref()
            .and_then(|at| at.timestamp_millis())
            .is_none_or(|ts| ts >= cutoff)
    });

    if entries.len() > HISTORY_MAX_ITEMS {
        let excess = entries.len() - HISTORY_MAX_ITEMS;
        entries.drain(..excess);
    }

    let removed = before - entries.len();
    if removed > 0 {
        tracing::debug!(removed, remaining = entries.len(), "Pruned deletion history");
    }
    removed
}
