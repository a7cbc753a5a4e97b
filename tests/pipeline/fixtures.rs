//! In-memory remote corpus used to drive the pipeline without a network

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use pmc_harvester::app::models::{Prefix, RemoteEntry};
use pmc_harvester::app::{ListingConnector, ListingSession, Mirror};
use pmc_harvester::errors::{ListingResult, MirrorError, MirrorResult};

/// Minimal NXML document carrying a pmc article identifier
pub fn nxml(identifier: &str) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\"?>\
         <!DOCTYPE article PUBLIC \"-//NLM//DTD JATS//EN\" \"JATS-archivearticle1.dtd\">\
         <article><front><article-meta>\
         <article-id pub-id-type=\"pmid\">999</article-id>\
         <article-id pub-id-type=\"pmc\">{}</article-id>\
         </article-meta></front></article>",
        identifier
    )
    .into_bytes()
}

/// Gzipped tarball with the given members
pub fn tarball(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (member, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, member, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Remote archive tree held in memory, keyed by prefix
#[derive(Default)]
pub struct FakeCorpus {
    archives: HashMap<Prefix, Vec<(String, Vec<u8>)>>,
}

impl FakeCorpus {
    pub fn with_archive(mut self, path: &str, bytes: Vec<u8>) -> Self {
        let entry = RemoteEntry::from_path(path).unwrap();
        self.archives
            .entry(entry.prefix)
            .or_default()
            .push((entry.name, bytes));
        self
    }

    pub fn prefixes(&self) -> Vec<Prefix> {
        let mut prefixes: Vec<Prefix> = self.archives.keys().copied().collect();
        prefixes.sort();
        prefixes
    }

    fn archive(&self, entry: &RemoteEntry) -> Option<&[u8]> {
        self.archives
            .get(&entry.prefix)?
            .iter()
            .find(|(name, _)| *name == entry.name)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

/// Listing connector serving the names of a [`FakeCorpus`]
pub struct FakeConnector {
    corpus: Arc<FakeCorpus>,
}

impl FakeConnector {
    pub fn new(corpus: Arc<FakeCorpus>) -> Self {
        Self { corpus }
    }
}

struct FakeSession {
    corpus: Arc<FakeCorpus>,
}

#[async_trait]
impl ListingSession for FakeSession {
    async fn list(&mut self, prefix: Prefix) -> ListingResult<Vec<RemoteEntry>> {
        let mut entries = vec![RemoteEntry::new(prefix, "README.txt")];
        if let Some(archives) = self.corpus.archives.get(&prefix) {
            entries.extend(
                archives
                    .iter()
                    .map(|(name, _)| RemoteEntry::new(prefix, name.clone())),
            );
        }
        Ok(entries)
    }
}

#[async_trait]
impl ListingConnector for FakeConnector {
    async fn connect(&self) -> ListingResult<Box<dyn ListingSession>> {
        Ok(Box::new(FakeSession {
            corpus: Arc::clone(&self.corpus),
        }))
    }
}

/// Mirror copying archives out of a [`FakeCorpus`] and recording each request
pub struct FakeMirror {
    corpus: Arc<FakeCorpus>,
    root: PathBuf,
    requested: Mutex<Vec<String>>,
}

impl FakeMirror {
    pub fn new(corpus: Arc<FakeCorpus>, root: &Path) -> Self {
        Self {
            corpus,
            root: root.to_path_buf(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Remote paths mirrored so far, sorted
    pub fn requested(&self) -> Vec<String> {
        let mut requested = self.requested.lock().unwrap().clone();
        requested.sort();
        requested
    }
}

#[async_trait]
impl Mirror for FakeMirror {
    async fn mirror(&self, entry: &RemoteEntry) -> MirrorResult<()> {
        self.requested.lock().unwrap().push(entry.path());
        let bytes = self
            .corpus
            .archive(entry)
            .ok_or_else(|| MirrorError::CommandFailed {
                url: entry.path(),
                status: Some(8),
            })?;
        fs::create_dir_all(entry.local_dir(&self.root))?;
        fs::write(entry.local_path(&self.root), bytes)?;
        Ok(())
    }
}
