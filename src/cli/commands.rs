//! Command handlers for PMC Harvester CLI
//!
//! This module wires the loaded configuration into the core application
//! components for each subcommand.

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::client::{parse_base_url, HttpHandler};
use crate::app::listing::HttpListingConnector;
use crate::app::mirror::{HttpMirror, Mirror, WgetMirror};
use crate::app::models::Prefix;
use crate::app::{BatchCleaner, Coordinator, LocalStateIndex, SessionResult};
use crate::cli::IndexArgs;
use crate::config::{AppConfig, MirrorBackend};
use crate::errors::{PipelineError, Result};

/// Handle the harvest command
///
/// Lists every prefix of the remote tree, downloads what the local mirror
/// lacks, and normalizes each archive. Only setup failures are errors.
pub async fn handle_harvest(config: &AppConfig) -> Result<()> {
    let client_config = config.remote.to_runtime_config()?;
    let coordinator_config = config.pipeline.to_runtime_config()?;
    let base = parse_base_url(&config.remote.base_url)?;

    let client = client_config.build_http_client()?;
    let handler = Arc::new(HttpHandler::new(client, client_config.rate_limit_rps)?);
    let connector = Arc::new(HttpListingConnector::new(Arc::clone(&handler), base.clone()));
    let mirror = build_mirror(config, handler, base.clone());

    info!(
        "Harvesting {} into {} ({:?} backend)",
        base,
        config.mirror.root.display(),
        config.mirror.backend
    );

    let coordinator = Coordinator::new(
        coordinator_config,
        config.mirror.root.clone(),
        connector,
        mirror,
    );
    let result = coordinator.run().await?;
    report_session(&result);
    Ok(())
}

/// Handle the clean command
pub async fn handle_clean(config: &AppConfig) -> Result<()> {
    let workers = config.batch.to_runtime_config()?;
    let cleaner = BatchCleaner::new(config.mirror.root.clone(), workers);
    let result = cleaner.run(Prefix::all()).await?;
    report_session(&result);
    Ok(())
}

/// Handle the index command
pub async fn handle_index(config: &AppConfig, args: IndexArgs) -> Result<()> {
    let pipeline = config.pipeline.to_runtime_config()?;
    let root = &config.mirror.root;
    if !root.is_dir() {
        return Err(PipelineError::RootNotAccessible { path: root.clone() }.into());
    }

    let index = LocalStateIndex::build(root, Prefix::all(), pipeline.index_workers).await?;
    let written = index.write_snapshot(&args.output)?;
    info!(
        "Indexed {} canonical directories under {}",
        written,
        root.display()
    );
    Ok(())
}

/// Choose the download backend named in `[mirror].backend`
fn build_mirror(config: &AppConfig, handler: Arc<HttpHandler>, base: url::Url) -> Arc<dyn Mirror> {
    let root = config.mirror.root.clone();
    match config.mirror.backend {
        MirrorBackend::Wget => Arc::new(WgetMirror::new(
            config.mirror.wget_program.clone(),
            base,
            root,
        )),
        MirrorBackend::Http => Arc::new(HttpMirror::new(handler, base, root)),
    }
}

fn report_session(result: &SessionResult) {
    if result.interrupted {
        warn!("Run interrupted; a later harvest or clean picks up where it stopped");
    }
    for error in &result.worker_errors {
        warn!("Worker error: {}", error);
    }
    info!(
        "{} archives processed, {} downloads failed, {} archives left on disk",
        result.stats.archives_processed(),
        result.stats.downloads_failed,
        result.stats.archives_not_removed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::ClientConfig;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_root(root: &std::path::Path) -> AppConfig {
        AppConfig::default().with_root(Some(root.to_path_buf()))
    }

    /// Test the index command writes one line per canonical directory
    #[tokio::test]
    async fn test_handle_index_writes_snapshot() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("7f").join("3c").join("PMC123456")).unwrap();
        fs::create_dir_all(root.path().join("00").join("01").join("PMC1")).unwrap();
        let output = root.path().join("index.txt");

        handle_index(
            &config_with_root(root.path()),
            IndexArgs {
                output: output.clone(),
            },
        )
        .await
        .unwrap();

        let snapshot = fs::read_to_string(output).unwrap();
        assert_eq!(snapshot, "00/01/PMC1\n7f/3c/PMC123456\n");
    }

    #[tokio::test]
    async fn test_handle_index_missing_root() {
        let root = TempDir::new().unwrap();
        let config = config_with_root(&root.path().join("missing"));
        let args = IndexArgs {
            output: root.path().join("index.txt"),
        };
        assert!(handle_index(&config, args).await.is_err());
    }

    /// Test the backend setting selects the mirror implementation
    #[test]
    fn test_build_mirror_backend() {
        let root = TempDir::new().unwrap();
        let mut config = config_with_root(root.path());
        let base = parse_base_url("http://127.0.0.1/pub/pmc/").unwrap();
        let client = ClientConfig::default().build_http_client().unwrap();
        let handler = Arc::new(HttpHandler::new(client, 10).unwrap());

        let wget = build_mirror(&config, Arc::clone(&handler), base.clone());
        assert!(wget.leaves_listing_artifacts());

        config.mirror.backend = MirrorBackend::Http;
        let http = build_mirror(&config, handler, base);
        assert!(!http.leaves_listing_artifacts());
    }
}
