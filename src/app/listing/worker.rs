//! Listing worker: drains the prefix queue and feeds the download queue

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::session::{ListingConnector, ListingSession};
use crate::app::coordinator::signals::shutdown_requested;
use crate::app::coordinator::stats::HarvestStats;
use crate::app::index::LocalStateIndex;
use crate::app::models::{Prefix, RemoteEntry};

/// One slot of the listing pool
///
/// Opens its session lazily and reopens it after a connection loss. A prefix
/// taken while no session can be opened is recorded as failed, so the worker
/// keeps draining the queue. Exits when the prefix queue is closed and
/// drained, when it stays idle for `queue_timeout`, or on shutdown.
pub struct ListingWorker {
    id: usize,
    connector: Arc<dyn ListingConnector>,
    index: Arc<LocalStateIndex>,
    prefixes: Receiver<Prefix>,
    downloads: Sender<RemoteEntry>,
    queue_timeout: Duration,
    stats: Arc<HarvestStats>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ListingWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        connector: Arc<dyn ListingConnector>,
        index: Arc<LocalStateIndex>,
        prefixes: Receiver<Prefix>,
        downloads: Sender<RemoteEntry>,
        queue_timeout: Duration,
        stats: Arc<HarvestStats>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            id,
            connector,
            index,
            prefixes,
            downloads,
            queue_timeout,
            stats,
            shutdown_rx,
        }
    }

    /// Run until the prefix queue is exhausted
    pub async fn run(mut self) {
        debug!("Listing worker {} started", self.id);
        let mut session: Option<Box<dyn ListingSession>> = None;

        loop {
            let next = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown_rx) => {
                    info!("Listing worker {} received shutdown signal", self.id);
                    break;
                }
                next = tokio::time::timeout(self.queue_timeout, self.prefixes.recv()) => next,
            };

            let prefix = match next {
                Ok(Ok(prefix)) => prefix,
                Ok(Err(_)) => {
                    debug!("Listing worker {}: prefix queue drained", self.id);
                    break;
                }
                Err(_) => {
                    info!(
                        "Listing worker {} idle for {:?}, exiting",
                        self.id, self.queue_timeout
                    );
                    break;
                }
            };

            if session.is_none() {
                session = self.open_session().await;
            }
            let Some(active) = session.as_mut() else {
                warn!("No listing session, abandoning prefix {}", prefix);
                self.stats.record_prefix_failed();
                continue;
            };

            match self.list_prefix(active.as_mut(), prefix).await {
                ListOutcome::Done => {}
                ListOutcome::ConnectionLost => {
                    info!("Listing worker {} lost its session", self.id);
                    session = None;
                }
                ListOutcome::QueueClosed => break,
            }
        }

        debug!("Listing worker {} finished", self.id);
    }

    async fn open_session(&self) -> Option<Box<dyn ListingSession>> {
        match self.connector.connect().await {
            Ok(session) => {
                debug!("Listing worker {} opened a session", self.id);
                Some(session)
            }
            Err(e) => {
                warn!("Listing worker {} could not open a session: {}", self.id, e);
                self.stats.record_session_failed();
                None
            }
        }
    }

    async fn list_prefix(&self, session: &mut dyn ListingSession, prefix: Prefix) -> ListOutcome {
        let entries = match session.list(prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Listing {} failed, abandoning prefix: {}", prefix, e);
                self.stats.record_prefix_failed();
                return if is_connection_loss(&e) {
                    ListOutcome::ConnectionLost
                } else {
                    ListOutcome::Done
                };
            }
        };
        self.stats.record_prefix_listed();

        for entry in entries.into_iter().filter(RemoteEntry::is_archive_candidate) {
            self.stats.record_candidate();
            if self.index.contains(prefix, &entry.canonical_key()) {
                debug!("{} already present", entry);
                self.stats.record_present();
                continue;
            }

            debug!("Enqueue {}", entry);
            if self.downloads.send(entry).await.is_err() {
                warn!("Download queue closed, listing worker {} stopping", self.id);
                return ListOutcome::QueueClosed;
            }
            self.stats.record_enqueued();
        }

        ListOutcome::Done
    }
}

enum ListOutcome {
    Done,
    ConnectionLost,
    QueueClosed,
}

fn is_connection_loss(error: &crate::errors::ListingError) -> bool {
    matches!(error, crate::errors::ListingError::Remote(e) if e.is_connection_loss())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::canonical::CanonicalDirectoryKey;
    use crate::app::coordinator::signals::create_shutdown_channel;
    use crate::app::models::LocalIndexEntry;
    use crate::errors::{ListingError, ListingResult};
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::errors::RemoteError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed listings; `connect` fails for the first `failures` calls
    struct StaticConnector {
        listings: HashMap<Prefix, Vec<&'static str>>,
        failures: AtomicUsize,
        connects: AtomicUsize,
        drop_on: Option<Prefix>,
    }

    impl StaticConnector {
        fn new(listings: HashMap<Prefix, Vec<&'static str>>) -> Self {
            Self {
                listings,
                failures: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                drop_on: None,
            }
        }

        fn failing(mut self, failures: usize) -> Self {
            self.failures = AtomicUsize::new(failures);
            self
        }

        fn dropping_on(mut self, prefix: Prefix) -> Self {
            self.drop_on = Some(prefix);
            self
        }
    }

    struct StaticSession {
        listings: HashMap<Prefix, Vec<&'static str>>,
        drop_on: Option<Prefix>,
    }

    /// A genuine connection-refused transport error
    async fn refused_connection() -> RemoteError {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let error = reqwest::get(format!("http://{}/", addr)).await.unwrap_err();
        RemoteError::from_transport(error)
    }

    #[async_trait]
    impl ListingSession for StaticSession {
        async fn list(&mut self, prefix: Prefix) -> ListingResult<Vec<RemoteEntry>> {
            if self.drop_on == Some(prefix) {
                return Err(ListingError::Remote(refused_connection().await));
            }
            match self.listings.get(&prefix) {
                Some(names) => Ok(names.iter().map(|n| RemoteEntry::new(prefix, *n)).collect()),
                None => Err(ListingError::InvalidListing {
                    prefix: prefix.to_string(),
                    reason: "boom".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl ListingConnector for StaticConnector {
        async fn connect(&self) -> ListingResult<Box<dyn ListingSession>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let refused = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(ListingError::SessionSetup {
                    reason: "refused".to_string(),
                });
            }
            Ok(Box::new(StaticSession {
                listings: self.listings.clone(),
                drop_on: self.drop_on,
            }))
        }
    }

    async fn run_workers(
        connector: Arc<StaticConnector>,
        index: LocalStateIndex,
        prefixes: &[Prefix],
        workers: usize,
    ) -> (Vec<RemoteEntry>, Arc<HarvestStats>, usize) {
        let (prefix_tx, prefix_rx) = async_channel::unbounded();
        let (download_tx, download_rx) = async_channel::unbounded();
        for prefix in prefixes {
            prefix_tx.send(*prefix).await.unwrap();
        }
        drop(prefix_tx);

        let (shutdown_tx, _) = create_shutdown_channel();
        let stats = Arc::new(HarvestStats::new());
        let index = Arc::new(index);
        let mut pool = tokio::task::JoinSet::new();
        for id in 0..workers {
            let worker = ListingWorker::new(
                id,
                Arc::clone(&connector) as Arc<dyn ListingConnector>,
                Arc::clone(&index),
                prefix_rx.clone(),
                download_tx.clone(),
                Duration::from_secs(5),
                Arc::clone(&stats),
                shutdown_tx.subscribe(),
            );
            pool.spawn(worker.run());
        }
        drop(download_tx);
        while let Some(joined) = pool.join_next().await {
            joined.unwrap();
        }

        let mut enqueued = Vec::new();
        while let Ok(entry) = download_rx.try_recv() {
            enqueued.push(entry);
        }
        (enqueued, stats, prefix_rx.len())
    }

    async fn run_worker(
        connector: StaticConnector,
        index: LocalStateIndex,
        prefixes: &[Prefix],
    ) -> (Vec<RemoteEntry>, Arc<HarvestStats>, usize) {
        run_workers(Arc::new(connector), index, prefixes, 1).await
    }

    /// Test candidates already in the index are never enqueued
    #[tokio::test]
    async fn test_skips_indexed_and_non_archive_entries() {
        let prefix = Prefix::new(0x7f, 0x3c);
        let connector = StaticConnector::new(HashMap::from([(
            prefix,
            vec!["PMC1.tar.gz", "PMC2.tar.gz", "file_list.csv"],
        )]));
        let index = LocalStateIndex::from_entries([LocalIndexEntry {
            prefix,
            key: CanonicalDirectoryKey::parse("PMC1").unwrap(),
        }]);

        let (enqueued, stats, _) = run_worker(connector, index, &[prefix]).await;

        assert_eq!(enqueued, vec![RemoteEntry::new(prefix, "PMC2.tar.gz")]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.candidates_seen, 2);
        assert_eq!(snapshot.candidates_present, 1);
        assert_eq!(snapshot.enqueued, 1);
    }

    /// Test a failing prefix is abandoned and the worker moves on
    #[tokio::test]
    async fn test_listing_failure_is_skipped() {
        let good = Prefix::new(0, 2);
        let connector = StaticConnector::new(HashMap::from([(good, vec!["PMC3.tar.gz"])]));

        let (enqueued, stats, _) =
            run_worker(connector, LocalStateIndex::default(), &[Prefix::new(0, 1), good]).await;

        assert_eq!(enqueued.len(), 1);
        assert_eq!(stats.snapshot().prefixes_failed, 1);
        assert_eq!(stats.snapshot().prefixes_listed, 1);
    }

    /// Test a worker that never gets a session still accounts for every prefix
    #[tokio::test]
    async fn test_session_failure_fails_prefix() {
        let connector = StaticConnector::new(HashMap::new()).failing(usize::MAX);

        let (enqueued, stats, remaining) =
            run_worker(connector, LocalStateIndex::default(), &[Prefix::new(0, 1)]).await;

        assert!(enqueued.is_empty());
        assert_eq!(remaining, 0);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions_failed, 1);
        assert_eq!(snapshot.prefixes_failed, 1);
    }

    /// Test workers keep draining after failed connects and recover once the
    /// connector answers again
    #[tokio::test]
    async fn test_pool_survives_failed_connects() {
        let prefixes: Vec<Prefix> = (0..4).map(|low| Prefix::new(0, low)).collect();
        let listings = prefixes
            .iter()
            .map(|prefix| (*prefix, vec!["PMC1.tar.gz"]))
            .collect();
        let connector = Arc::new(StaticConnector::new(listings).failing(2));

        let (enqueued, stats, remaining) =
            run_workers(Arc::clone(&connector), LocalStateIndex::default(), &prefixes, 2).await;

        let snapshot = stats.snapshot();
        assert_eq!(remaining, 0);
        assert_eq!(snapshot.sessions_failed, 2);
        assert_eq!(snapshot.prefixes_listed + snapshot.prefixes_failed, prefixes.len());
        assert_eq!(snapshot.prefixes_listed, 2);
        assert_eq!(enqueued.len(), 2);
    }

    /// Test a dropped connection fails only its prefix and a fresh session
    /// lists the rest
    #[tokio::test]
    async fn test_connection_loss_reopens_session() {
        let dropped = Prefix::new(0, 1);
        let prefixes = [Prefix::new(0, 0), dropped, Prefix::new(0, 2), Prefix::new(0, 3)];
        let listings = prefixes
            .iter()
            .map(|prefix| (*prefix, vec!["PMC1.tar.gz"]))
            .collect();
        let connector = Arc::new(StaticConnector::new(listings).dropping_on(dropped));

        let (enqueued, stats, _) =
            run_workers(Arc::clone(&connector), LocalStateIndex::default(), &prefixes, 1).await;

        let snapshot = stats.snapshot();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.prefixes_failed, 1);
        assert_eq!(snapshot.prefixes_listed, 3);
        assert_eq!(snapshot.sessions_failed, 0);
        let listed: Vec<Prefix> = enqueued.iter().map(|entry| entry.prefix).collect();
        assert_eq!(listed, vec![Prefix::new(0, 0), Prefix::new(0, 2), Prefix::new(0, 3)]);
    }
}
