//! Local mirror index
//!
//! Scans `<root>/<hh>/<hh>` for every prefix in parallel and records the
//! canonical directories already materialized. The index is read-only once
//! built and is shared with the listing workers behind an `Arc`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::app::canonical::CanonicalDirectoryKey;
use crate::app::models::{LocalIndexEntry, Prefix};
use crate::errors::{PipelineError, PipelineResult};

/// Set of canonical directories present in the local mirror, keyed by prefix
#[derive(Debug, Clone, Default)]
pub struct LocalStateIndex {
    entries: HashMap<Prefix, HashSet<CanonicalDirectoryKey>>,
    len: usize,
}

impl LocalStateIndex {
    /// Build the index by scanning each prefix directory under `root`
    ///
    /// At most `workers` directories are scanned concurrently. A missing
    /// prefix directory contributes no entries.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TaskJoin`] if a scan task panics.
    pub async fn build(
        root: &Path,
        prefixes: impl IntoIterator<Item = Prefix>,
        workers: usize,
    ) -> PipelineResult<Self> {
        let start = std::time::Instant::now();
        let mut scans = stream::iter(prefixes)
            .map(|prefix| {
                let dir = prefix.local_dir(root);
                tokio::task::spawn_blocking(move || (prefix, scan_prefix_dir(&dir)))
            })
            .buffer_unordered(workers.max(1));

        let mut index = Self::default();
        while let Some(joined) = scans.next().await {
            let (prefix, keys) = joined.map_err(|e| PipelineError::TaskJoin {
                reason: e.to_string(),
            })?;
            index.insert_all(prefix, keys);
        }

        info!(
            "Local index built: {} directories across {} prefixes in {:.1}s",
            index.len,
            index.entries.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(index)
    }

    /// Build an index from known entries
    pub fn from_entries(entries: impl IntoIterator<Item = LocalIndexEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.insert_all(entry.prefix, [entry.key]);
        }
        index
    }

    fn insert_all(&mut self, prefix: Prefix, keys: impl IntoIterator<Item = CanonicalDirectoryKey>) {
        let set = self.entries.entry(prefix).or_default();
        for key in keys {
            if set.insert(key) {
                self.len += 1;
            }
        }
        if set.is_empty() {
            self.entries.remove(&prefix);
        }
    }

    /// Whether `key` is already materialized under `prefix`
    pub fn contains(&self, prefix: Prefix, key: &CanonicalDirectoryKey) -> bool {
        self.entries
            .get(&prefix)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Total number of indexed directories
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no directories
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All entries in prefix then name order
    pub fn entries(&self) -> Vec<LocalIndexEntry> {
        let mut entries: Vec<LocalIndexEntry> = self
            .entries
            .iter()
            .flat_map(|(prefix, keys)| {
                keys.iter().map(|key| LocalIndexEntry {
                    prefix: *prefix,
                    key: key.clone(),
                })
            })
            .collect();
        entries.sort();
        entries
    }

    /// Write one `<prefix>/<directory>` line per entry to `path`
    ///
    /// Returns the number of lines written.
    pub fn write_snapshot(&self, path: &Path) -> io::Result<usize> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        let entries = self.entries();
        for entry in &entries {
            writeln!(out, "{}", entry)?;
        }
        out.flush()?;
        info!("Wrote {} index entries to {}", entries.len(), path.display());
        Ok(entries.len())
    }
}

/// Subdirectory names of one prefix directory that are valid canonical keys
fn scan_prefix_dir(dir: &Path) -> Vec<CanonicalDirectoryKey> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Cannot scan {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut keys = Vec::new();
    for entry in read_dir.flatten() {
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name();
        match name.to_str().and_then(CanonicalDirectoryKey::parse) {
            Some(key) => keys.push(key),
            None => debug!("Ignoring non-canonical directory {:?} in {}", name, dir.display()),
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(name: &str) -> CanonicalDirectoryKey {
        CanonicalDirectoryKey::parse(name).unwrap()
    }

    /// Test directories are indexed, files and odd names are not
    #[tokio::test]
    async fn test_build_scans_prefix_directories() {
        let root = TempDir::new().unwrap();
        let prefix = Prefix::new(0x7f, 0x3c);
        let dir = prefix.local_dir(root.path());
        fs::create_dir_all(dir.join("PMC1")).unwrap();
        fs::create_dir_all(dir.join("PMC2")).unwrap();
        fs::create_dir_all(dir.join("Not (canonical)")).unwrap();
        fs::write(dir.join(".listing"), b"").unwrap();
        fs::write(dir.join("PMC3.tar.gz"), b"").unwrap();

        let prefixes = [prefix, Prefix::new(0, 0)];
        let index = LocalStateIndex::build(root.path(), prefixes, 4).await.unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains(prefix, &key("PMC1")));
        assert!(index.contains(prefix, &key("PMC2")));
        assert!(!index.contains(prefix, &key("PMC3")));
        assert!(!index.contains(Prefix::new(0, 0), &key("PMC1")));
    }

    /// Test a missing mirror root yields an empty index
    #[tokio::test]
    async fn test_build_missing_root() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nowhere");

        let index = LocalStateIndex::build(&missing, Prefix::all().take(16), 2)
            .await
            .unwrap();
        assert!(index.is_empty());
    }

    /// Test membership is scoped to the prefix
    #[test]
    fn test_contains_is_prefix_scoped() {
        let index = LocalStateIndex::from_entries([LocalIndexEntry {
            prefix: Prefix::new(1, 2),
            key: key("PMC9"),
        }]);
        assert!(index.contains(Prefix::new(1, 2), &key("PMC9")));
        assert!(!index.contains(Prefix::new(2, 1), &key("PMC9")));
    }

    #[test]
    fn test_write_snapshot_is_sorted() {
        let dir = TempDir::new().unwrap();
        let index = LocalStateIndex::from_entries([
            LocalIndexEntry {
                prefix: Prefix::new(0xff, 0),
                key: key("B"),
            },
            LocalIndexEntry {
                prefix: Prefix::new(0, 1),
                key: key("Z"),
            },
            LocalIndexEntry {
                prefix: Prefix::new(0, 1),
                key: key("A"),
            },
        ]);

        let path = dir.path().join("index.txt");
        assert_eq!(index.write_snapshot(&path).unwrap(), 3);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "00/01/A\n00/01/Z\nff/00/B\n"
        );
    }
}
