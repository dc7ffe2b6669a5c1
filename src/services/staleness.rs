//! Staleness & Cache Evaluation
//!
//! Pure decisions over a run record: whether its fingerprint still matches
//! the content, and whether the run is fresh enough to reuse instead of
//! re-analyzing.

use chrono::{DateTime, Utc};

use crate::models::run::{AnalysisRun, RunStatus};

/// Whether the run's stored fingerprint differs from the current one.
/// Exact string inequality, with no normalization and no partial matching.
pub fn is_stale(run: &AnalysisRun, current_fingerprint: &str) -> bool {
    run.fingerprint != current_fingerprint
}

/// Whether a run may be reused as a cache hit: it succeeded, its fingerprint
/// still matches, and it is younger than the TTL. A TTL of zero always
/// disables caching.
pub fn is_cache_valid(
    run: &AnalysisRun,
    current_fingerprint: &str,
    ttl_secs: u64,
    now: DateTime<Utc>,
) -> bool {
    if ttl_secs == 0 {
        return false;
    }
    run.status == RunStatus::Success
        && !is_stale(run, current_fingerprint)
        && run.age_secs(now) < ttl_secs as i64
}
