//! Harvest statistics tracking and aggregation
//!
//! Workers bump shared atomic counters; the coordinator takes a snapshot at
//! the end of the run and wraps it in a [`SessionResult`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::ArchiveState;

/// Live counters shared by all workers of a run
#[derive(Debug, Default)]
pub struct HarvestStats {
    prefixes_listed: AtomicUsize,
    prefixes_failed: AtomicUsize,
    sessions_failed: AtomicUsize,
    candidates_seen: AtomicUsize,
    candidates_present: AtomicUsize,
    enqueued: AtomicUsize,
    downloads_failed: AtomicUsize,
    skipped: AtomicUsize,
    incomplete: AtomicUsize,
    normalized: AtomicUsize,
    partial_failures: AtomicUsize,
    archives_not_removed: AtomicUsize,
}

impl HarvestStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_prefix_listed(&self) {
        self.prefixes_listed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prefix_failed(&self) {
        self.prefixes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candidate(&self) {
        self.candidates_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_present(&self) {
        self.candidates_present.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_failed(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one archive that reached a terminal state
    pub fn record_outcome(&self, state: ArchiveState, archive_removed: bool) {
        let counter = match state {
            ArchiveState::Skipped => &self.skipped,
            ArchiveState::Incomplete => &self.incomplete,
            ArchiveState::Normalized => &self.normalized,
            ArchiveState::PartialFailure => &self.partial_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if !archive_removed {
            self.archives_not_removed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> HarvestSnapshot {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        HarvestSnapshot {
            prefixes_listed: load(&self.prefixes_listed),
            prefixes_failed: load(&self.prefixes_failed),
            sessions_failed: load(&self.sessions_failed),
            candidates_seen: load(&self.candidates_seen),
            candidates_present: load(&self.candidates_present),
            enqueued: load(&self.enqueued),
            downloads_failed: load(&self.downloads_failed),
            skipped: load(&self.skipped),
            incomplete: load(&self.incomplete),
            normalized: load(&self.normalized),
            partial_failures: load(&self.partial_failures),
            archives_not_removed: load(&self.archives_not_removed),
        }
    }
}

/// Plain copy of [`HarvestStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSnapshot {
    pub prefixes_listed: usize,
    pub prefixes_failed: usize,
    pub sessions_failed: usize,
    pub candidates_seen: usize,
    pub candidates_present: usize,
    pub enqueued: usize,
    pub downloads_failed: usize,
    pub skipped: usize,
    pub incomplete: usize,
    pub normalized: usize,
    pub partial_failures: usize,
    pub archives_not_removed: usize,
}

impl HarvestSnapshot {
    /// Archives that reached a terminal state
    pub fn archives_processed(&self) -> usize {
        self.skipped + self.incomplete + self.normalized + self.partial_failures
    }
}

/// Final result of a harvest or cleaning session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// Final counters
    pub stats: HarvestSnapshot,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session finished
    pub finished_at: DateTime<Utc>,
    /// Whether the run was cut short by a shutdown signal
    pub interrupted: bool,
    /// Worker panics and shutdown problems
    pub worker_errors: Vec<String>,
}

impl SessionResult {
    /// Wall-clock duration of the session
    pub fn total_duration(&self) -> Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the run drained normally without worker errors
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.worker_errors.is_empty()
    }

    /// One-line summary for the final log message
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let status = if self.interrupted {
            "interrupted"
        } else if self.worker_errors.is_empty() {
            "completed"
        } else {
            "completed with worker errors"
        };
        format!(
            "Session {} in {:.1}s: {} prefixes listed ({} failed), {} candidates, \
             {} already present, {} enqueued, {} normalized, {} skipped, {} incomplete, \
             {} partial failures, {} download failures",
            status,
            self.total_duration().as_secs_f64(),
            s.prefixes_listed,
            s.prefixes_failed,
            s.candidates_seen,
            s.candidates_present,
            s.enqueued,
            s.normalized,
            s.skipped,
            s.incomplete,
            s.partial_failures,
            s.downloads_failed
        )
    }
}
