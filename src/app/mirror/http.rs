//! In-process mirroring over HTTP
//!
//! Streams the archive into `<name>.part` and renames it into place, so an
//! interrupted download never leaves a truncated `.tar.gz` behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::Mirror;
use crate::app::client::{self, HttpHandler};
use crate::app::models::RemoteEntry;
use crate::constants::files;
use crate::errors::{MirrorError, MirrorResult, RemoteError};

/// Downloads archives with the shared rate-limited HTTP client
#[derive(Debug, Clone)]
pub struct HttpMirror {
    handler: Arc<HttpHandler>,
    base: Url,
    root: PathBuf,
}

impl HttpMirror {
    pub fn new(handler: Arc<HttpHandler>, base: Url, root: impl Into<PathBuf>) -> Self {
        Self {
            handler,
            base,
            root: root.into(),
        }
    }

    async fn download(&self, url: &Url, temp_path: &Path) -> MirrorResult<()> {
        let response = self.handler.get_response(url).await?;
        if !response.status().is_success() {
            return Err(RemoteError::ServerError {
                status: response.status().as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(RemoteError::from_transport)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Mirror for HttpMirror {
    async fn mirror(&self, entry: &RemoteEntry) -> MirrorResult<()> {
        let url = client::entry_url(&self.base, entry)?;
        let destination = entry.local_path(&self.root);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(&destination);
        if let Err(e) = self.download(&url, &temp_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &destination)
            .await
            .map_err(|_| MirrorError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: destination.clone(),
            })?;
        debug!("Downloaded {} to {}", url, destination.display());
        Ok(())
    }
}

fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(files::TEMP_FILE_SUFFIX);
    PathBuf::from(name)
}
