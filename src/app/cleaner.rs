//! Standalone cleaning pass over the local mirror
//!
//! Walks every prefix directory, deletes the `.listing` artifact, and runs the
//! archive processor on each `.tar.gz` still on disk. Picks up whatever an
//! interrupted harvest left behind; running it twice is harmless.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::app::archive::{ArchiveProcessor, ArchiveReport};
use crate::app::canonical::is_archive_candidate;
use crate::app::coordinator::config::validate_pool_size;
use crate::app::coordinator::stats::{HarvestStats, SessionResult};
use crate::app::models::Prefix;
use crate::constants::mirror;
use crate::errors::{PipelineError, Result};

/// Batch normalizer for archives already on disk
#[derive(Debug, Clone)]
pub struct BatchCleaner {
    root: PathBuf,
    workers: usize,
    processor: ArchiveProcessor,
}

impl BatchCleaner {
    pub fn new(root: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            root: root.into(),
            workers,
            processor: ArchiveProcessor::new(),
        }
    }

    /// Clean every given prefix directory, `workers` directories at a time
    ///
    /// # Errors
    ///
    /// Fails only on an invalid pool size, a missing root, or a panicked
    /// cleaning task.
    pub async fn run(&self, prefixes: impl IntoIterator<Item = Prefix>) -> Result<SessionResult> {
        validate_pool_size("clean_workers", self.workers)?;
        if !self.root.is_dir() {
            return Err(PipelineError::RootNotAccessible {
                path: self.root.clone(),
            }
            .into());
        }

        let started_at = Utc::now();
        let stats = Arc::new(HarvestStats::new());
        info!(
            "Cleaning {} with {} workers",
            self.root.display(),
            self.workers
        );

        let mut tasks = stream::iter(prefixes)
            .map(|prefix| {
                let dir = prefix.local_dir(&self.root);
                let processor = self.processor.clone();
                tokio::task::spawn_blocking(move || clean_prefix_dir(&processor, &dir))
            })
            .buffer_unordered(self.workers);

        while let Some(joined) = tasks.next().await {
            let reports = joined.map_err(|e| PipelineError::TaskJoin {
                reason: e.to_string(),
            })?;
            for report in reports {
                stats.record_outcome(report.state(), report.archive_removed);
            }
        }

        let result = SessionResult {
            stats: stats.snapshot(),
            started_at,
            finished_at: Utc::now(),
            interrupted: false,
            worker_errors: Vec::new(),
        };
        info!("{}", result.summary());
        Ok(result)
    }
}

/// Clean one prefix directory; a missing directory is a no-op
pub fn clean_prefix_dir(processor: &ArchiveProcessor, dir: &Path) -> Vec<ArchiveReport> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Cannot clean {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut archives = Vec::new();
    for entry in read_dir.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == mirror::LISTING_ARTIFACT {
            match fs::remove_file(entry.path()) {
                Ok(()) => debug!("Removed {}", entry.path().display()),
                Err(e) => warn!("Cannot remove {}: {}", entry.path().display(), e),
            }
        } else if is_archive_candidate(&name) && entry.file_type().is_ok_and(|t| t.is_file()) {
            archives.push(name);
        }
    }

    archives.sort();
    archives
        .iter()
        .map(|name| processor.process(dir, name))
        .collect()
}
