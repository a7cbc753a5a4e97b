//! Archive normalization
//!
//! Turns a downloaded `.tar.gz` into a canonical directory holding exactly
//! `<identifier>.pdf` and `<identifier>.nxml`, then removes the archive.

pub mod outcome;
pub mod processor;

pub use outcome::{
    ArchiveBundle, ArchiveOutcome, ArchiveReport, ExtractResult, ExtractedMembers, RenameResult,
};
pub use processor::ArchiveProcessor;
