//! Data models for the harvesting pipeline
//!
//! This module contains the value types that flow between the pipeline
//! stages: namespace prefixes, remote listing entries, local index entries,
//! and the per-archive state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::app::canonical::{canonical_directory_key, is_archive_candidate, CanonicalDirectoryKey};
use crate::constants::prefixes;

/// Error returned when a string is not a valid `hh/hh` prefix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid prefix: {0:?} (expected two hex octets such as \"3f/a2\")")]
pub struct InvalidPrefix(pub String);

/// Two-level hexadecimal namespace key partitioning the remote corpus
///
/// Rendered as `"3f/a2"`. The namespace holds 65,536 disjoint prefixes and
/// each maps to one directory `<root>/3f/a2` in the local mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    high: u8,
    low: u8,
}

impl Prefix {
    /// Create a prefix from its two octets
    pub const fn new(high: u8, low: u8) -> Self {
        Self { high, low }
    }

    /// Enumerate the whole namespace, `00/00` through `ff/ff`
    pub fn all() -> impl Iterator<Item = Prefix> {
        (0..=u8::MAX).flat_map(|high| (0..=u8::MAX).map(move |low| Prefix::new(high, low)))
    }

    /// Number of prefixes in the namespace
    pub const fn count() -> usize {
        prefixes::PREFIX_COUNT
    }

    /// Local directory holding this prefix under the mirror root
    pub fn local_dir(&self, root: &Path) -> PathBuf {
        root.join(format!("{:02x}", self.high))
            .join(format!("{:02x}", self.low))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}/{:02x}", self.high, self.low)
    }
}

impl FromStr for Prefix {
    type Err = InvalidPrefix;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPrefix(s.to_string());
        let (high, low) = s.split_once('/').ok_or_else(invalid)?;

        let octet = |part: &str| {
            if part.len() != 2 {
                return None;
            }
            u8::from_str_radix(part, 16).ok()
        };

        match (octet(high), octet(low)) {
            (Some(high), Some(low)) => Ok(Prefix::new(high, low)),
            _ => Err(invalid()),
        }
    }
}

/// One entry of a remote listing: `<prefix>/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEntry {
    /// Prefix the entry was listed under
    pub prefix: Prefix,
    /// Base name of the entry
    pub name: String,
}

impl RemoteEntry {
    /// Create a new remote entry
    pub fn new(prefix: Prefix, name: impl Into<String>) -> Self {
        Self {
            prefix,
            name: name.into(),
        }
    }

    /// Parse a full remote path such as `"7f/3c/PMC123456.tar.gz"`
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_start_matches('/');
        let (prefix, name) = path.get(..5).zip(path.get(5..))?;
        let name = name.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(prefix.parse().ok()?, name))
    }

    /// Full remote path relative to the corpus base
    pub fn path(&self) -> String {
        format!("{}/{}", self.prefix, self.name)
    }

    /// Whether the entry looks like a per-document archive
    pub fn is_archive_candidate(&self) -> bool {
        is_archive_candidate(&self.name)
    }

    /// Canonical directory key the entry materializes as
    pub fn canonical_key(&self) -> CanonicalDirectoryKey {
        canonical_directory_key(&self.name)
    }

    /// Local directory corresponding to the entry's prefix
    pub fn local_dir(&self, root: &Path) -> PathBuf {
        self.prefix.local_dir(root)
    }

    /// Local path the mirroring collaborator writes the archive to
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.local_dir(root).join(&self.name)
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.name)
    }
}

/// A canonical directory already materialized in the local mirror
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalIndexEntry {
    /// Prefix directory containing it
    pub prefix: Prefix,
    /// Directory name
    pub key: CanonicalDirectoryKey,
}

impl fmt::Display for LocalIndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.key)
    }
}

/// Lifecycle of a single archive through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveState {
    /// Seen in a remote listing
    Listed,
    /// Pushed onto the download queue
    Enqueued,
    /// Mirroring collaborator running
    Downloading,
    /// Archive on local disk, awaiting normalization
    Downloaded,
    /// Canonical directory already existed
    Skipped,
    /// Archive lacked a required member or could not be read
    Incomplete,
    /// Canonical directory holds both renamed members
    Normalized,
    /// Extraction, move, metadata, or rename step failed
    PartialFailure,
}

impl ArchiveState {
    /// Whether the archive has left the pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArchiveState::Skipped
                | ArchiveState::Incomplete
                | ArchiveState::Normalized
                | ArchiveState::PartialFailure
        )
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArchiveState::Listed => "listed",
            ArchiveState::Enqueued => "enqueued",
            ArchiveState::Downloading => "downloading",
            ArchiveState::Downloaded => "downloaded",
            ArchiveState::Skipped => "skipped",
            ArchiveState::Incomplete => "incomplete",
            ArchiveState::Normalized => "normalized",
            ArchiveState::PartialFailure => "partial-failure",
        };
        f.write_str(label)
    }
}
