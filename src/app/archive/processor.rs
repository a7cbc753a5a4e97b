//! Normalization of a single downloaded archive
//!
//! The processor inspects a `.tar.gz`, extracts exactly the document and
//! metadata members into a private staging directory, moves them under the
//! canonical directory name, renames them after the identifier found in the
//! metadata, and always removes the archive afterwards.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};

use super::outcome::{
    ArchiveBundle, ArchiveOutcome, ArchiveReport, ExtractResult, ExtractedMembers, RenameResult,
};
use crate::app::canonical::{
    canonical_directory_key, extract_document_identifier, is_document_member, is_metadata_member,
    CanonicalDirectoryKey,
};
use crate::app::models::ArchiveState;
use crate::constants::{archive, files};
use crate::errors::{ArchiveError, ArchiveResult};

/// Normalizes downloaded archives into canonical directories
///
/// Stateless and cheap to clone; concurrent calls on different archives are
/// safe because every archive maps to its own canonical directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveProcessor;

impl ArchiveProcessor {
    /// Create a new processor
    pub fn new() -> Self {
        Self
    }

    /// Normalize `<prefix_dir>/<archive_name>` and remove the archive
    ///
    /// Never fails: every problem is folded into the returned report. The
    /// archive file is removed on every exit path, including unwinding.
    pub fn process(&self, prefix_dir: &Path, archive_name: &str) -> ArchiveReport {
        let archive = prefix_dir.join(archive_name);
        debug!("Looking at {} in {}", archive_name, prefix_dir.display());

        let removal = ArchiveRemoval::new(&archive);
        let outcome = self.normalize(prefix_dir, archive_name, &archive);
        let archive_removed = removal.finish();

        match outcome.state() {
            ArchiveState::Normalized | ArchiveState::Skipped => {
                info!("{}: {}", archive.display(), outcome)
            }
            _ => warn!("{}: {}", archive.display(), outcome),
        }

        ArchiveReport {
            archive,
            outcome,
            archive_removed,
        }
    }

    fn normalize(&self, prefix_dir: &Path, archive_name: &str, archive: &Path) -> ArchiveOutcome {
        let bundle = match self.inspect(archive) {
            Ok(bundle) => bundle,
            Err(e) => {
                return ArchiveOutcome::Unreadable {
                    reason: e.to_string(),
                }
            }
        };

        let Some((document, metadata)) = bundle.members() else {
            return ArchiveOutcome::Incomplete {
                has_document: bundle.document.is_some(),
                has_metadata: bundle.metadata.is_some(),
            };
        };

        let key = canonical_directory_key(archive_name);
        if key.as_str().is_empty() {
            return ArchiveOutcome::InvalidName;
        }

        let canonical_dir = prefix_dir.join(&key);
        if canonical_dir.exists() {
            return ArchiveOutcome::SkippedExisting {
                directory: canonical_dir,
            };
        }

        debug!(
            "Extracting {} and {} to {}",
            document,
            metadata,
            prefix_dir.display()
        );
        let extracted = match self.extract(archive, prefix_dir, &key, document, metadata) {
            Ok(extracted) => extracted,
            Err(error) => return ArchiveOutcome::ExtractFailed { error },
        };

        let (document_path, metadata_path) = match relocate(&extracted, &canonical_dir) {
            Ok(paths) => paths,
            Err(error) => {
                return ArchiveOutcome::MoveFailed {
                    extracted: extracted.staging,
                    error,
                }
            }
        };
        remove_staging(&extracted.staging);

        let identifier = match extract_document_identifier(&metadata_path) {
            Ok(identifier) => identifier,
            Err(error) => {
                return ArchiveOutcome::MetadataFailed {
                    directory: canonical_dir,
                    error,
                }
            }
        };

        let document = rename_member(
            &document_path,
            &canonical_dir.join(identifier.file_name(archive::DOCUMENT_EXTENSION)),
        );
        let metadata = rename_member(
            &metadata_path,
            &canonical_dir.join(identifier.file_name(archive::METADATA_EXTENSION)),
        );
        prune_empty_parent(&document_path, &canonical_dir);
        prune_empty_parent(&metadata_path, &canonical_dir);

        if document.is_ok() && metadata.is_ok() {
            ArchiveOutcome::Normalized {
                directory: canonical_dir,
                identifier,
            }
        } else {
            ArchiveOutcome::PartialRename {
                directory: canonical_dir,
                identifier,
                document,
                metadata,
            }
        }
    }

    /// Enumerate the archive and pick the document and metadata members
    ///
    /// When several members match, the last one in archive order wins.
    pub fn inspect(&self, archive: &Path) -> ArchiveResult<ArchiveBundle> {
        let mut tar = open_archive(archive)?;
        let read_error = |source: io::Error| ArchiveError::Read {
            path: archive.to_path_buf(),
            source,
        };

        let mut bundle = ArchiveBundle::new(archive);
        for entry in tar.entries().map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let member = entry.path().map_err(read_error)?.to_string_lossy().into_owned();
            if is_document_member(&member) {
                bundle.document = Some(member);
            } else if is_metadata_member(&member) {
                bundle.metadata = Some(member);
            }
        }

        Ok(bundle)
    }

    /// Unpack the two members into a fresh staging directory, keeping their archive paths
    ///
    /// The staging directory `.<key>.part` belongs to this archive alone, so
    /// directories left in the prefix directory by earlier runs never mix
    /// into the result. On failure it is removed again.
    fn extract(
        &self,
        archive: &Path,
        prefix_dir: &Path,
        key: &CanonicalDirectoryKey,
        document: &str,
        metadata: &str,
    ) -> ExtractResult {
        let document_rel = safe_member_path(document)?;
        let metadata_rel = safe_member_path(metadata)?;
        let staging = staging_dir(prefix_dir, key);
        prepare_staging(&staging)?;

        if let Err(e) = unpack_members(archive, &staging, [document, metadata]) {
            debug!("Removing partially extracted {}", staging.display());
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        Ok(ExtractedMembers {
            internal_dir: shared_internal_dir(&document_rel, &metadata_rel),
            document: staging.join(document_rel),
            metadata: staging.join(metadata_rel),
            staging,
        })
    }
}

/// Removes the archive when finished or dropped
struct ArchiveRemoval<'a> {
    path: &'a Path,
    done: bool,
}

impl<'a> ArchiveRemoval<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, done: false }
    }

    fn finish(mut self) -> bool {
        self.done = true;
        remove_archive(self.path)
    }
}

impl Drop for ArchiveRemoval<'_> {
    fn drop(&mut self) {
        if !self.done {
            remove_archive(self.path);
        }
    }
}

fn remove_archive(path: &Path) -> bool {
    debug!("Removing archive {}", path.display());
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove archive {}: {}", path.display(), e);
            false
        }
    }
}

fn staging_dir(prefix_dir: &Path, key: &CanonicalDirectoryKey) -> PathBuf {
    prefix_dir.join(format!(".{}{}", key, files::TEMP_FILE_SUFFIX))
}

/// Create an empty staging directory, discarding one left by an interrupted run
fn prepare_staging(staging: &Path) -> ArchiveResult<()> {
    let staging_error = |source: io::Error| ArchiveError::Staging {
        path: staging.to_path_buf(),
        source,
    };
    match fs::remove_dir_all(staging) {
        Ok(()) => debug!("Discarded stale {}", staging.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(staging_error(e)),
    }
    fs::create_dir(staging).map_err(staging_error)
}

fn remove_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Cannot remove {}: {}", staging.display(), e);
        }
    }
}

fn open_archive(archive: &Path) -> ArchiveResult<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

fn unpack_members(archive: &Path, prefix_dir: &Path, members: [&str; 2]) -> ArchiveResult<()> {
    let mut tar = open_archive(archive)?;
    let read_error = |source: io::Error| ArchiveError::Read {
        path: archive.to_path_buf(),
        source,
    };

    let mut pending: Vec<&str> = members.to_vec();
    for entry in tar.entries().map_err(read_error)? {
        let mut entry = entry.map_err(read_error)?;
        let member = entry.path().map_err(read_error)?.to_string_lossy().into_owned();

        let Some(position) = pending.iter().position(|m| *m == member) else {
            continue;
        };

        match entry.unpack_in(prefix_dir) {
            Ok(true) => {}
            Ok(false) => return Err(ArchiveError::UnsafeMemberPath { member }),
            Err(source) => return Err(ArchiveError::Extract { member, source }),
        }

        pending.swap_remove(position);
        if pending.is_empty() {
            return Ok(());
        }
    }

    match pending.first() {
        Some(member) => Err(ArchiveError::MemberNotFound {
            member: member.to_string(),
        }),
        None => Ok(()),
    }
}

/// Relative path of a member, rejecting anything that could leave the prefix directory
fn safe_member_path(member: &str) -> ArchiveResult<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(member).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(ArchiveError::UnsafeMemberPath {
                    member: member.to_string(),
                })
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(ArchiveError::UnsafeMemberPath {
            member: member.to_string(),
        });
    }
    Ok(path)
}

/// Top-level archive directory holding both members, if they share one
fn shared_internal_dir(document: &Path, metadata: &Path) -> Option<PathBuf> {
    let top = |path: &Path| {
        let mut components = path.components();
        let first = components.next()?;
        components.next()?;
        Some(PathBuf::from(first.as_os_str()))
    };

    match (top(document), top(metadata)) {
        (Some(a), Some(b)) if a == b => Some(a),
        _ => None,
    }
}

/// Move the extracted members out of staging under the canonical directory
///
/// Returns the relocated document and metadata paths.
fn relocate(
    extracted: &ExtractedMembers,
    canonical_dir: &Path,
) -> ArchiveResult<(PathBuf, PathBuf)> {
    match &extracted.internal_dir {
        Some(dir) => {
            let source = extracted.staging.join(dir);
            debug!("Rename {} to {}", source.display(), canonical_dir.display());
            move_path(&source, canonical_dir)?;

            let rebase = |path: &Path| match path.strip_prefix(&source) {
                Ok(relative) => canonical_dir.join(relative),
                Err(_) => path.to_path_buf(),
            };
            Ok((rebase(&extracted.document), rebase(&extracted.metadata)))
        }
        None => {
            fs::create_dir(canonical_dir).map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    ArchiveError::TargetExists {
                        path: canonical_dir.to_path_buf(),
                    }
                } else {
                    ArchiveError::Move {
                        from: extracted.staging.clone(),
                        to: canonical_dir.to_path_buf(),
                        source,
                    }
                }
            })?;

            let mut relocated = Vec::with_capacity(2);
            for file in [&extracted.document, &extracted.metadata] {
                let name = file.file_name().unwrap_or(file.as_os_str());
                let target = canonical_dir.join(name);
                move_path(file, &target)?;
                relocated.push(target);
            }

            let metadata = relocated.pop().unwrap_or_default();
            let document = relocated.pop().unwrap_or_default();
            Ok((document, metadata))
        }
    }
}

fn move_path(from: &Path, to: &Path) -> ArchiveResult<()> {
    if to.exists() {
        return Err(ArchiveError::TargetExists {
            path: to.to_path_buf(),
        });
    }
    fs::rename(from, to).map_err(|source| ArchiveError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn rename_member(from: &Path, to: &Path) -> RenameResult {
    if from == to {
        return Ok(to.to_path_buf());
    }
    debug!("Rename {} to {}", from.display(), to.display());
    move_path(from, to).map(|()| to.to_path_buf())
}

/// Remove the now-empty directory a file was moved out of, stopping at `stop`
fn prune_empty_parent(file: &Path, stop: &Path) {
    if let Some(parent) = file.parent() {
        if parent != stop && parent.starts_with(stop) {
            let _ = fs::remove_dir(parent);
        }
    }
}
