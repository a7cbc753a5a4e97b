//! Harvest orchestration
//!
//! The coordinator owns the two work queues and the two worker pools:
//!
//! 1. Build the [`LocalStateIndex`] of the mirror root
//! 2. Seed the prefix queue with every prefix and close it
//! 3. Spawn the listing pool, which feeds the download queue
//! 4. Spawn the download pool, which mirrors and normalizes each archive
//! 5. Wait for both pools to drain and report a [`SessionResult`]
//!
//! The download queue closes when the last listing worker exits, so the
//! download pool drains and stops on its own. A shutdown signal makes every
//! worker stop after its current item.
//!
//! - [`config`] - Pool sizes and timeouts
//! - [`stats`] - Shared counters and the final session result
//! - [`signals`] - Ctrl-C / SIGTERM handling

pub mod config;
pub mod signals;
pub mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::archive::ArchiveProcessor;
use crate::app::index::LocalStateIndex;
use crate::app::listing::{ListingConnector, ListingWorker};
use crate::app::mirror::Mirror;
use crate::app::models::{Prefix, RemoteEntry};
use crate::app::worker::DownloadWorker;
use crate::errors::{PipelineError, Result};

pub use config::CoordinatorConfig;
pub use signals::{create_shutdown_channel, shutdown_requested, SignalHandler};
pub use stats::{HarvestSnapshot, HarvestStats, SessionResult};

/// Orchestrates one harvest-and-clean run
pub struct Coordinator {
    config: CoordinatorConfig,
    root: PathBuf,
    connector: Arc<dyn ListingConnector>,
    mirror: Arc<dyn Mirror>,
    processor: ArchiveProcessor,
    prefixes: Vec<Prefix>,
    handle_signals: bool,
    shutdown_tx: broadcast::Sender<()>,
}

impl Coordinator {
    /// Create a coordinator over the whole prefix namespace
    pub fn new(
        config: CoordinatorConfig,
        root: impl Into<PathBuf>,
        connector: Arc<dyn ListingConnector>,
        mirror: Arc<dyn Mirror>,
    ) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();
        Self {
            config,
            root: root.into(),
            connector,
            mirror,
            processor: ArchiveProcessor::new(),
            prefixes: Prefix::all().collect(),
            handle_signals: true,
            shutdown_tx,
        }
    }

    /// Restrict the run to the given prefixes
    pub fn with_prefixes(mut self, prefixes: impl IntoIterator<Item = Prefix>) -> Self {
        self.prefixes = prefixes.into_iter().collect();
        self
    }

    /// Enable or disable installing Ctrl-C / SIGTERM handlers during the run
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Sender that triggers the same graceful shutdown as a signal
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the complete pipeline
    ///
    /// # Errors
    ///
    /// Only setup problems are errors: invalid configuration, an unusable
    /// mirror root, or a failed index build. Per-prefix and per-archive
    /// failures are logged and counted.
    pub async fn run(&self) -> Result<SessionResult> {
        self.config.validate()?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|_| PipelineError::RootNotAccessible {
                path: self.root.clone(),
            })?;

        let started_at = Utc::now();
        let mut interrupt_rx = self.shutdown_tx.subscribe();
        let signal_task = self
            .handle_signals
            .then(|| SignalHandler::new(self.shutdown_tx.clone()).setup());

        info!(
            "Building local index of {} ({} prefixes, {} workers)",
            self.root.display(),
            self.prefixes.len(),
            self.config.index_workers
        );
        let index = Arc::new(
            LocalStateIndex::build(
                &self.root,
                self.prefixes.iter().copied(),
                self.config.index_workers,
            )
            .await?,
        );

        let (prefix_tx, prefix_rx) = async_channel::unbounded::<Prefix>();
        for prefix in &self.prefixes {
            let _ = prefix_tx.send(*prefix).await;
        }
        drop(prefix_tx);

        let (download_tx, download_rx) = async_channel::unbounded::<RemoteEntry>();
        let stats = Arc::new(HarvestStats::new());

        info!(
            "Starting {} listing workers and {} download workers",
            self.config.listing_workers, self.config.download_workers
        );
        let mut listers = JoinSet::new();
        for id in 0..self.config.listing_workers {
            let worker = ListingWorker::new(
                id,
                Arc::clone(&self.connector),
                Arc::clone(&index),
                prefix_rx.clone(),
                download_tx.clone(),
                self.config.queue_timeout,
                Arc::clone(&stats),
                self.shutdown_tx.subscribe(),
            );
            listers.spawn(worker.run());
        }
        drop(prefix_rx);
        drop(download_tx);

        let mut downloaders = JoinSet::new();
        for id in 0..self.config.download_workers {
            let worker = DownloadWorker::new(
                id,
                Arc::clone(&self.mirror),
                self.processor.clone(),
                self.root.clone(),
                download_rx.clone(),
                Arc::clone(&stats),
                self.shutdown_tx.subscribe(),
            );
            downloaders.spawn(worker.run());
        }
        drop(download_rx);

        let mut worker_errors = Vec::new();
        let mut drain_shutdown_rx = self.shutdown_tx.subscribe();
        let drained = tokio::select! {
            _ = async {
                join_pool("listing", &mut listers, &mut worker_errors).await;
                join_pool("download", &mut downloaders, &mut worker_errors).await;
            } => true,
            _ = async {
                shutdown_requested(&mut drain_shutdown_rx).await;
                tokio::time::sleep(self.config.shutdown_timeout).await;
            } => false,
        };

        if !drained {
            let error = PipelineError::ShutdownTimeout {
                seconds: self.config.shutdown_timeout.as_secs(),
            };
            warn!("{}, aborting remaining workers", error);
            listers.abort_all();
            downloaders.abort_all();
            worker_errors.push(error.to_string());
        }

        if let Some(task) = signal_task {
            task.abort();
        }

        let result = SessionResult {
            stats: stats.snapshot(),
            started_at,
            finished_at: Utc::now(),
            interrupted: interrupt_rx.try_recv().is_ok(),
            worker_errors,
        };
        info!("{}", result.summary());
        Ok(result)
    }
}

/// Await every task of a pool, logging panics without stopping the others
async fn join_pool(pool: &'static str, set: &mut JoinSet<()>, errors: &mut Vec<String>) {
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            let error = PipelineError::WorkerPanic {
                pool,
                reason: e.to_string(),
            };
            error!("{}", error);
            errors.push(error.to_string());
        }
    }
}
