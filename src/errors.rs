//! Error types for PMC Harvester
//!
//! This module defines the error types for every component of the harvesting
//! pipeline. Per-unit errors (one prefix, one archive) are logged and skipped
//! by the workers; only setup errors ever reach the top-level [`AppError`].

use std::path::PathBuf;
use thiserror::Error;

/// HTTP errors shared by the listing session and the HTTP mirror backend
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Connection could not be established or was dropped
    #[error("Connection to remote host lost: {0}")]
    Connection(#[source] reqwest::Error),

    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error: HTTP {status} for {url}")]
    ServerError { status: u16, url: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Client could not be constructed
    #[error("HTTP client configuration error: {0}")]
    ClientSetup(String),
}

impl RemoteError {
    /// Classify a transport error, separating connection loss from other failures
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            RemoteError::Connection(error)
        } else {
            RemoteError::Http(error)
        }
    }

    /// Whether the error means the session's connection is gone
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, RemoteError::Connection(_))
    }
}

/// Remote listing errors
#[derive(Error, Debug)]
pub enum ListingError {
    /// Underlying remote request failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Listing session could not be opened
    #[error("Failed to open listing session: {reason}")]
    SessionSetup { reason: String },

    /// Directory index could not be interpreted
    #[error("Unreadable directory listing for {prefix}: {reason}")]
    InvalidListing { prefix: String, reason: String },
}

/// Mirroring collaborator errors
#[derive(Error, Debug)]
pub enum MirrorError {
    /// HTTP download failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// I/O error while writing the archive
    #[error("File I/O error while mirroring")]
    Io(#[from] std::io::Error),

    /// External mirroring program could not be started
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External mirroring program reported failure
    #[error("Mirroring {url} exited with status {status:?}")]
    CommandFailed { url: String, status: Option<i32> },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Archive normalization errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Archive could not be opened
    #[error("Cannot open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive stream is corrupt or truncated
    #[error("Cannot read archive {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata document could not be parsed or lacks the identifier
    #[error("Malformed metadata document {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    /// Member could not be written to disk
    #[error("Cannot extract member {member}: {source}")]
    Extract {
        member: String,
        #[source]
        source: std::io::Error,
    },

    /// Staging directory could not be prepared
    #[error("Cannot prepare staging directory {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Member path points outside the extraction directory
    #[error("Member {member} escapes the extraction directory")]
    UnsafeMemberPath { member: String },

    /// Member listed during inspection vanished on the extraction pass
    #[error("Member {member} not found during extraction")]
    MemberNotFound { member: String },

    /// Target of a move already exists
    #[error("Target already exists: {path}")]
    TargetExists { path: PathBuf },

    /// Move or rename failed
    #[error("Cannot move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline coordination errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Worker panic or unexpected termination
    #[error("{pool} worker panicked or terminated unexpectedly: {reason}")]
    WorkerPanic { pool: &'static str, reason: String },

    /// Blocking task could not be joined
    #[error("Blocking task failed: {reason}")]
    TaskJoin { reason: String },

    /// Mirror root could not be used
    #[error("Mirror root not accessible: {path}")]
    RootNotAccessible { path: PathBuf },

    /// Coordinator shutdown timeout
    #[error("Shutdown timeout after {seconds} seconds")]
    ShutdownTimeout { seconds: u64 },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// User configuration directory could not be determined
    #[error("Could not determine user config directory")]
    NoConfigDirectory,
}

impl ConfigError {
    /// Convenience constructor for [`ConfigError::InvalidValue`]
    pub fn invalid(field: &str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Remote request error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Remote listing error
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// Mirroring error
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// Archive normalization error
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Pipeline coordination error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get error category for the exit message
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Remote(_) => "remote",
            AppError::Listing(_) => "listing",
            AppError::Mirror(_) => "mirror",
            AppError::Archive(_) => "archive",
            AppError::Pipeline(_) => "pipeline",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Remote request result type alias
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Listing result type alias
pub type ListingResult<T> = std::result::Result<T, ListingError>;

/// Mirror result type alias
pub type MirrorResult<T> = std::result::Result<T, MirrorError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Pipeline result type alias
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
