//! Core application logic for PMC Harvester
//!
//! The harvest pipeline and its building blocks:
//!
//! - [`index`] - Scan of the canonical directories already on disk
//! - [`listing`] - Remote prefix listing workers and the HTTP listing session
//! - [`mirror`] - Download backends (`wget --mirror` or in-process HTTP)
//! - [`worker`] - Download workers that mirror and normalize archives
//! - [`archive`] - Extraction and renaming of a single archive
//! - [`coordinator`] - Queue and pool orchestration for a harvest run
//! - [`cleaner`] - Standalone normalization pass over the local mirror
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pmc_harvester::app::client::{parse_base_url, ClientConfig, HttpHandler};
//! use pmc_harvester::app::listing::HttpListingConnector;
//! use pmc_harvester::app::mirror::WgetMirror;
//! use pmc_harvester::app::{Coordinator, CoordinatorConfig};
//!
//! # async fn example() -> pmc_harvester::Result<()> {
//! let base = parse_base_url("https://ftp.ncbi.nlm.nih.gov/pub/pmc/")?;
//! let client = ClientConfig::default().build_http_client()?;
//! let handler = Arc::new(HttpHandler::new(client, 50)?);
//!
//! let coordinator = Coordinator::new(
//!     CoordinatorConfig::default(),
//!     "ftp.ncbi.nlm.nih.gov/pub/pmc",
//!     Arc::new(HttpListingConnector::new(handler, base.clone())),
//!     Arc::new(WgetMirror::new("wget", base, "ftp.ncbi.nlm.nih.gov/pub/pmc")),
//! );
//! let result = coordinator.run().await?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod canonical;
pub mod cleaner;
pub mod client;
pub mod coordinator;
pub mod index;
pub mod listing;
pub mod mirror;
pub mod models;
pub mod worker;

// Re-export main public API
pub use archive::{ArchiveOutcome, ArchiveProcessor, ArchiveReport};
pub use canonical::{canonical_directory_key, CanonicalDirectoryKey, DocumentIdentifier};
pub use cleaner::BatchCleaner;
pub use client::{ClientConfig, HttpHandler};
pub use coordinator::{Coordinator, CoordinatorConfig, HarvestStats, SessionResult};
pub use index::LocalStateIndex;
pub use listing::{ListingConnector, ListingSession, ListingWorker};
pub use mirror::Mirror;
pub use models::{ArchiveState, LocalIndexEntry, Prefix, RemoteEntry};
pub use worker::DownloadWorker;
