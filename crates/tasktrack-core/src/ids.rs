use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::session::TaskId;

/// Returns an identifier that is not in `existing`.
///
/// Seeded from `now` in milliseconds and kept above the largest known identifier, so
/// identifiers keep growing and a retired one is not handed out again. Once the largest
/// known identifier is `u64::MAX` there is nothing above it; the first unused value from the
/// seed upward, then downward, is taken instead. Only identifiers in `existing` are guarded
/// against; callers pass every id they know of.
pub fn allocate(existing: &BTreeSet<TaskId>, now: DateTime<Utc>) -> TaskId {
    let seed = u64::try_from(now.timestamp_millis()).unwrap_or(0).max(1);
    let Some(&max) = existing.last() else {
        return seed;
    };
    if max < seed {
        return seed;
    }
    if let Some(next) = max.checked_add(1) {
        return next;
    }
    // `existing` is finite, so a gap exists on one side of the seed.
    (seed..=TaskId::MAX)
        .find(|id| !existing.contains(id))
        .or_else(|| (1..seed).rev().find(|id| !existing.contains(id)))
        .unwrap_or(seed)
}
