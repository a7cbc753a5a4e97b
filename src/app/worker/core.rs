//! Download worker: drains the download queue, mirrors, then normalizes

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::Receiver;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::app::archive::ArchiveProcessor;
use crate::app::coordinator::signals::shutdown_requested;
use crate::app::coordinator::stats::HarvestStats;
use crate::app::mirror::Mirror;
use crate::app::models::{ArchiveState, RemoteEntry};
use crate::constants::mirror;

/// One slot of the download pool
///
/// Every dequeued entry goes through the mirror and then the archive
/// processor, even when mirroring failed, so partial downloads are removed.
pub struct DownloadWorker {
    id: usize,
    mirror: Arc<dyn Mirror>,
    processor: ArchiveProcessor,
    root: PathBuf,
    downloads: Receiver<RemoteEntry>,
    stats: Arc<HarvestStats>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl DownloadWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        mirror: Arc<dyn Mirror>,
        processor: ArchiveProcessor,
        root: PathBuf,
        downloads: Receiver<RemoteEntry>,
        stats: Arc<HarvestStats>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            id,
            mirror,
            processor,
            root,
            downloads,
            stats,
            shutdown_rx,
        }
    }

    /// Run until the download queue is closed and drained, or shut down
    ///
    /// The queue closes once every listing worker has dropped its sender, so
    /// a slow listing phase never ends the pool early.
    pub async fn run(mut self) {
        debug!("Download worker {} started", self.id);

        loop {
            let next = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown_rx) => {
                    info!("Download worker {} received shutdown signal", self.id);
                    break;
                }
                next = self.downloads.recv() => next,
            };

            match next {
                Ok(entry) => self.handle(entry).await,
                Err(_) => {
                    debug!("Download worker {}: queue drained", self.id);
                    break;
                }
            }
        }

        debug!("Download worker {} finished", self.id);
    }

    /// Mirror one entry and hand it to the archive processor
    pub async fn handle(&self, entry: RemoteEntry) {
        debug!("Worker {} downloading {}", self.id, entry);
        if let Err(e) = self.mirror.mirror(&entry).await {
            warn!("Mirroring {} failed: {}", entry, e);
            self.stats.record_download_failed();
        }

        let prefix_dir = entry.local_dir(&self.root);
        if self.mirror.leaves_listing_artifacts() {
            remove_listing_artifact(&prefix_dir).await;
        }

        let processor = self.processor.clone();
        let name = entry.name.clone();
        match tokio::task::spawn_blocking(move || processor.process(&prefix_dir, &name)).await {
            Ok(report) => self
                .stats
                .record_outcome(report.state(), report.archive_removed),
            Err(e) => {
                warn!("Processing {} did not complete: {}", entry, e);
                let removed = !entry.local_path(&self.root).exists();
                self.stats
                    .record_outcome(ArchiveState::PartialFailure, removed);
            }
        }
    }
}

/// Delete the `.listing` file an FTP-style mirror leaves in a prefix directory
pub async fn remove_listing_artifact(prefix_dir: &Path) {
    let artifact = prefix_dir.join(mirror::LISTING_ARTIFACT);
    match tokio::fs::remove_file(&artifact).await {
        Ok(()) => debug!("Removed {}", artifact.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", artifact.display(), e),
    }
}
