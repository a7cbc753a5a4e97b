//! Integration tests for the harvest pipeline
//!
//! These tests run the coordinator end to end against an in-memory corpus:
//! listing, the local index, download workers, and archive normalization.

mod fixtures;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use pmc_harvester::app::models::Prefix;
use pmc_harvester::app::{Coordinator, CoordinatorConfig, Mirror, SessionResult};

use fixtures::{nxml, tarball, FakeConnector, FakeCorpus, FakeMirror};

/// Create integration test coordinator configuration
///
/// Small pools so several workers still compete for the same queues.
fn create_integration_test_config() -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_listing_workers(2)
        .with_download_workers(3)
        .with_index_workers(2)
        .with_queue_timeout(Duration::from_secs(5))
        .with_shutdown_timeout(Duration::from_secs(5))
}

/// Archive laid out the way the remote tree packages an article
fn article_archive(key: &str, identifier: &str) -> Vec<u8> {
    let metadata = nxml(identifier);
    tarball(&[
        (&format!("{}/main.pdf", key), b"%PDF-1.4 article"),
        (&format!("{}/main.nxml", key), &metadata),
        (&format!("{}/fig1.jpg", key), b"jpeg"),
    ])
}

async fn harvest(corpus: &Arc<FakeCorpus>, root: &Path) -> (SessionResult, Arc<FakeMirror>) {
    let mirror = Arc::new(FakeMirror::new(Arc::clone(corpus), root));
    let mut prefixes = corpus.prefixes();
    prefixes.push(Prefix::new(0, 0));

    let coordinator = Coordinator::new(
        create_integration_test_config(),
        root,
        Arc::new(FakeConnector::new(Arc::clone(corpus))),
        Arc::clone(&mirror) as Arc<dyn Mirror>,
    )
    .with_prefixes(prefixes)
    .with_signal_handling(false);

    let result = tokio::time::timeout(Duration::from_secs(30), coordinator.run())
        .await
        .expect("harvest did not finish")
        .unwrap();
    (result, mirror)
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Test a listed archive ends up as `<id>.pdf` + `<id>.nxml` with the archive gone
#[tokio::test]
async fn test_harvest_normalizes_archive() {
    let root = TempDir::new().unwrap();
    let corpus = Arc::new(
        FakeCorpus::default()
            .with_archive("7f/3c/PMC123456.tar.gz", article_archive("PMC123456", "PMC123456")),
    );

    let (result, mirror) = harvest(&corpus, root.path()).await;

    let prefix_dir = root.path().join("7f").join("3c");
    assert_eq!(dir_names(&prefix_dir), vec!["PMC123456"]);
    assert_eq!(
        dir_names(&prefix_dir.join("PMC123456")),
        vec!["PMC123456.nxml", "PMC123456.pdf"]
    );
    assert_eq!(
        fs::read(prefix_dir.join("PMC123456").join("PMC123456.pdf")).unwrap(),
        b"%PDF-1.4 article"
    );
    assert_eq!(mirror.requested(), vec!["7f/3c/PMC123456.tar.gz"]);
    assert_eq!(result.stats.enqueued, 1);
    assert_eq!(result.stats.normalized, 1);
    assert_eq!(result.stats.archives_not_removed, 0);
    assert!(result.is_clean());
}

/// Test candidates already present in the local index are never downloaded
#[tokio::test]
async fn test_indexed_candidates_are_not_enqueued() {
    let root = TempDir::new().unwrap();
    let corpus = Arc::new(
        FakeCorpus::default()
            .with_archive("7f/3c/PMC1.tar.gz", article_archive("PMC1", "PMC1"))
            .with_archive("7f/3c/PMC2.tar.gz", article_archive("PMC2", "PMC2")),
    );
    let existing = root.path().join("7f").join("3c").join("PMC1");
    fs::create_dir_all(&existing).unwrap();
    fs::write(existing.join("PMC1.pdf"), b"already here").unwrap();

    let (result, mirror) = harvest(&corpus, root.path()).await;

    assert_eq!(mirror.requested(), vec!["7f/3c/PMC2.tar.gz"]);
    assert_eq!(result.stats.candidates_seen, 2);
    assert_eq!(result.stats.candidates_present, 1);
    assert_eq!(result.stats.enqueued, 1);
    assert_eq!(dir_names(&existing), vec!["PMC1.pdf"]);
}

/// Test a second harvest over an unchanged mirror enqueues nothing
#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let root = TempDir::new().unwrap();
    let corpus = Arc::new(
        FakeCorpus::default()
            .with_archive("01/02/PMC10.tar.gz", article_archive("PMC10", "PMC10"))
            .with_archive("ab/cd/PMC20.tar.gz", article_archive("PMC20", "PMC20")),
    );

    let (first, _) = harvest(&corpus, root.path()).await;
    assert_eq!(first.stats.normalized, 2);

    let (second, mirror) = harvest(&corpus, root.path()).await;
    assert_eq!(second.stats.enqueued, 0);
    assert_eq!(second.stats.candidates_present, 2);
    assert!(mirror.requested().is_empty());
}

/// Test an archive without the document is removed and leaves no directory
#[tokio::test]
async fn test_metadata_only_archive_is_discarded() {
    let root = TempDir::new().unwrap();
    let metadata = nxml("PMC77");
    let corpus = Arc::new(FakeCorpus::default().with_archive(
        "10/20/PMC77.tar.gz",
        tarball(&[("PMC77/main.nxml", &metadata)]),
    ));

    let (result, _) = harvest(&corpus, root.path()).await;

    let prefix_dir = root.path().join("10").join("20");
    assert!(dir_names(&prefix_dir).is_empty());
    assert_eq!(result.stats.incomplete, 1);
    assert_eq!(result.stats.normalized, 0);
}

/// Test the internal directory name need not match the archive name
#[tokio::test]
async fn test_internal_directory_is_renamed_to_canonical_key() {
    let root = TempDir::new().unwrap();
    let corpus = Arc::new(FakeCorpus::default().with_archive(
        "3a/4b/Some.Journal.2020.tar.gz",
        article_archive("pkg_4242", "PMC4242"),
    ));

    let (result, _) = harvest(&corpus, root.path()).await;

    let prefix_dir = root.path().join("3a").join("4b");
    assert_eq!(dir_names(&prefix_dir), vec!["Some_Journal_2020"]);
    assert_eq!(
        dir_names(&prefix_dir.join("Some_Journal_2020")),
        vec!["PMC4242.nxml", "PMC4242.pdf"]
    );
    assert_eq!(result.stats.normalized, 1);
}
