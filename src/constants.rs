//! Application constants for PMC Harvester
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Remote corpus location
pub mod remote {
    /// Host serving the PMC open-access tree
    pub const PMC_HOST: &str = "ftp.ncbi.nlm.nih.gov";

    /// Base URL of the archive tree; prefixes are resolved relative to it
    pub const BASE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pub/pmc/";

    /// CSS selector for entries of an HTTP directory index
    pub const LISTING_LINK_SELECTOR: &str = "a[href]";
}

/// Local mirror layout
pub mod mirror {
    /// Default mirror root, matching the layout produced by `wget --mirror`
    pub const DEFAULT_ROOT: &str = "ftp.ncbi.nlm.nih.gov/pub/pmc";

    /// Directory listing artifact left behind by FTP mirroring tools
    pub const LISTING_ARTIFACT: &str = ".listing";

    /// Default program used by the wget mirror backend
    pub const WGET_PROGRAM: &str = "wget";
}

/// Archive member patterns and naming
pub mod archive {
    /// Suffix identifying archive candidates in remote listings
    pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

    /// Extension of the primary document member
    pub const DOCUMENT_EXTENSION: &str = "pdf";

    /// Extension of the metadata document member
    pub const METADATA_EXTENSION: &str = "nxml";

    /// Replacement for characters outside `[A-Za-z0-9_-]` in directory keys
    pub const SANITIZED_CHAR: char = '_';
}

/// Metadata document query: `/article/front/article-meta/article-id[@pub-id-type='pmc']`
pub mod metadata {
    /// Element path from the document root down to the identifier element
    pub const IDENTIFIER_PATH: [&str; 4] = ["article", "front", "article-meta", "article-id"];

    /// Attribute selecting the identifier flavour
    pub const IDENTIFIER_TYPE_ATTRIBUTE: &str = "pub-id-type";

    /// Attribute value of the PMC identifier
    pub const IDENTIFIER_TYPE: &str = "pmc";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "PMC-Harvester/0.1.0 (Corpus Mirroring Tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 64;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for remote requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;

    /// Maximum retry attempts for throttled requests (429/503)
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Upper bound for rate limiter jitter (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 100;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic downloads
    pub const TEMP_FILE_SUFFIX: &str = ".part";
}

/// Worker and concurrency configuration
pub mod workers {
    use super::Duration;

    /// Default number of remote listing workers
    pub const DEFAULT_LISTING_WORKERS: usize = 8;

    /// Default number of download workers
    pub const DEFAULT_DOWNLOAD_WORKERS: usize = 48;

    /// Default parallelism for local index building
    pub const DEFAULT_INDEX_WORKERS: usize = 15;

    /// Default parallelism for the standalone cleaning pass
    pub const DEFAULT_CLEAN_WORKERS: usize = 47;

    /// Upper bound for any single pool
    pub const MAX_WORKER_COUNT: usize = 512;

    /// Idle wait on a queue before a worker concludes the pipeline has drained
    pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(3600);

    /// Time allowed for workers to finish in-flight items after an interrupt
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Prefix namespace
pub mod prefixes {
    /// Number of distinct values per prefix level (one hex octet)
    pub const LEVEL_WIDTH: usize = 256;

    /// Total number of prefixes in the namespace
    pub const PREFIX_COUNT: usize = LEVEL_WIDTH * LEVEL_WIDTH;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Configuration file discovery
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "pmc-harvester.toml";

    /// Application directory name under the user/system config directory
    pub const APP_CONFIG_DIR: &str = "pmc-harvester";

    /// Configuration file name inside the application directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use archive::{ARCHIVE_SUFFIX, DOCUMENT_EXTENSION, METADATA_EXTENSION};
pub use http::USER_AGENT;
pub use mirror::LISTING_ARTIFACT;
pub use workers::{DEFAULT_DOWNLOAD_WORKERS, DEFAULT_LISTING_WORKERS};
