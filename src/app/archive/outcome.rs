//! Per-step results and per-archive outcome records
//!
//! Every normalization step reports an explicit result; the processor folds
//! them into one [`ArchiveOutcome`] that workers log and count.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::app::canonical::DocumentIdentifier;
use crate::app::models::ArchiveState;
use crate::errors::{ArchiveError, ArchiveResult};

/// Members of interest found while inspecting an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveBundle {
    /// Archive on local disk
    pub archive: PathBuf,
    /// Archive-internal path of the primary document, if any
    pub document: Option<String>,
    /// Archive-internal path of the metadata document, if any
    pub metadata: Option<String>,
}

impl ArchiveBundle {
    /// Create an empty bundle for an archive
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            document: None,
            metadata: None,
        }
    }

    /// Both members, if both were found
    pub fn members(&self) -> Option<(&str, &str)> {
        Some((self.document.as_deref()?, self.metadata.as_deref()?))
    }
}

/// Where the two members landed after extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMembers {
    /// Fresh directory the members were unpacked into
    pub staging: PathBuf,
    /// Archive-internal subdirectory both members live under, relative to `staging`
    pub internal_dir: Option<PathBuf>,
    /// Extracted primary document
    pub document: PathBuf,
    /// Extracted metadata document
    pub metadata: PathBuf,
}

/// Result of the extraction step
pub type ExtractResult = ArchiveResult<ExtractedMembers>;

/// Result of renaming one member to its identifier-based name
pub type RenameResult = ArchiveResult<PathBuf>;

/// Terminal outcome of normalizing one archive
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// Archive missing, truncated, or not a gzip'd tar
    Unreadable { reason: String },
    /// Archive name yields no usable directory key
    InvalidName,
    /// Archive lacks the document or the metadata member
    Incomplete {
        has_document: bool,
        has_metadata: bool,
    },
    /// Canonical directory already materialized
    SkippedExisting { directory: PathBuf },
    /// Members could not be extracted
    ExtractFailed { error: ArchiveError },
    /// Extracted subdirectory could not be moved to the canonical name
    MoveFailed {
        extracted: PathBuf,
        error: ArchiveError,
    },
    /// Identifier could not be read; members keep their extracted names
    MetadataFailed {
        directory: PathBuf,
        error: ArchiveError,
    },
    /// Both members renamed to `<identifier>.<ext>`
    Normalized {
        directory: PathBuf,
        identifier: DocumentIdentifier,
    },
    /// At least one rename failed
    PartialRename {
        directory: PathBuf,
        identifier: DocumentIdentifier,
        document: RenameResult,
        metadata: RenameResult,
    },
}

impl ArchiveOutcome {
    /// Terminal pipeline state this outcome corresponds to
    pub fn state(&self) -> ArchiveState {
        match self {
            ArchiveOutcome::Unreadable { .. }
            | ArchiveOutcome::InvalidName
            | ArchiveOutcome::Incomplete { .. } => ArchiveState::Incomplete,
            ArchiveOutcome::SkippedExisting { .. } => ArchiveState::Skipped,
            ArchiveOutcome::Normalized { .. } => ArchiveState::Normalized,
            ArchiveOutcome::ExtractFailed { .. }
            | ArchiveOutcome::MoveFailed { .. }
            | ArchiveOutcome::MetadataFailed { .. }
            | ArchiveOutcome::PartialRename { .. } => ArchiveState::PartialFailure,
        }
    }

    /// Canonical directory produced or found, if any
    pub fn directory(&self) -> Option<&Path> {
        match self {
            ArchiveOutcome::SkippedExisting { directory }
            | ArchiveOutcome::MetadataFailed { directory, .. }
            | ArchiveOutcome::Normalized { directory, .. }
            | ArchiveOutcome::PartialRename { directory, .. } => Some(directory),
            _ => None,
        }
    }

    /// Whether the archive was fully normalized
    pub fn is_success(&self) -> bool {
        matches!(self, ArchiveOutcome::Normalized { .. })
    }
}

impl fmt::Display for ArchiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveOutcome::Unreadable { reason } => write!(f, "unreadable archive: {}", reason),
            ArchiveOutcome::InvalidName => write!(f, "archive name yields an empty directory key"),
            ArchiveOutcome::Incomplete {
                has_document,
                has_metadata,
            } => write!(
                f,
                "incomplete archive (document: {}, metadata: {})",
                has_document, has_metadata
            ),
            ArchiveOutcome::SkippedExisting { directory } => {
                write!(f, "already present at {}", directory.display())
            }
            ArchiveOutcome::ExtractFailed { error } => write!(f, "extraction failed: {}", error),
            ArchiveOutcome::MoveFailed { extracted, error } => {
                write!(f, "left at {}: {}", extracted.display(), error)
            }
            ArchiveOutcome::MetadataFailed { directory, error } => {
                write!(f, "unrenamed in {}: {}", directory.display(), error)
            }
            ArchiveOutcome::Normalized {
                directory,
                identifier,
            } => write!(f, "normalized as {} in {}", identifier, directory.display()),
            ArchiveOutcome::PartialRename {
                directory,
                identifier,
                document,
                metadata,
            } => {
                write!(f, "partially renamed to {} in {}", identifier, directory.display())?;
                if let Err(e) = document {
                    write!(f, "; document: {}", e)?;
                }
                if let Err(e) = metadata {
                    write!(f, "; metadata: {}", e)?;
                }
                Ok(())
            }
        }
    }
}

/// Everything known about one archive after processing
#[derive(Debug)]
pub struct ArchiveReport {
    /// Archive that was processed
    pub archive: PathBuf,
    /// What happened to it
    pub outcome: ArchiveOutcome,
    /// Whether the archive file is gone from disk
    pub archive_removed: bool,
}

impl ArchiveReport {
    /// Terminal state of the archive
    pub fn state(&self) -> ArchiveState {
        self.outcome.state()
    }
}
