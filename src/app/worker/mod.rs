//! Download pool workers

pub mod core;

pub use self::core::{remove_listing_artifact, DownloadWorker};
