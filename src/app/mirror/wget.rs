//! Mirroring through an external `wget --mirror` process

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use super::Mirror;
use crate::app::client;
use crate::app::models::RemoteEntry;
use crate::errors::{MirrorError, MirrorResult};

/// Spawns `wget --mirror` per archive
///
/// Host and base path components are cut so the file lands at
/// `<root>/<hh>/<hh>/<name>` whatever the base URL is.
#[derive(Debug, Clone)]
pub struct WgetMirror {
    program: String,
    base: Url,
    root: PathBuf,
}

impl WgetMirror {
    pub fn new(program: impl Into<String>, base: Url, root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base,
            root: root.into(),
        }
    }

    /// Command line arguments for one entry
    pub fn args(&self, url: &Url) -> Vec<String> {
        vec![
            "--mirror".to_string(),
            "--no-verbose".to_string(),
            "--no-host-directories".to_string(),
            format!("--cut-dirs={}", cut_dirs(&self.base)),
            format!("--directory-prefix={}", self.root.display()),
            url.to_string(),
        ]
    }
}

/// Number of non-empty path segments in the base URL
fn cut_dirs(base: &Url) -> usize {
    base.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

#[async_trait]
impl Mirror for WgetMirror {
    async fn mirror(&self, entry: &RemoteEntry) -> MirrorResult<()> {
        let url = client::entry_url(&self.base, entry)?;
        debug!("Mirroring {} with {}", url, self.program);

        let output = Command::new(&self.program)
            .args(self.args(&url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MirrorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            debug!(
                "{} stderr for {}: {}",
                self.program,
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(MirrorError::CommandFailed {
                url: url.to_string(),
                status: output.status.code(),
            });
        }
        Ok(())
    }

    fn leaves_listing_artifacts(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Prefix;

    fn mirror(program: &str) -> WgetMirror {
        let base = client::parse_base_url("https://ftp.ncbi.nlm.nih.gov/pub/pmc/").unwrap();
        WgetMirror::new(program, base, "/data/mirror")
    }

    #[test]
    fn test_args_cut_base_path() {
        let mirror = mirror("wget");
        let entry = RemoteEntry::new(Prefix::new(0x7f, 0x3c), "PMC1.tar.gz");
        let url = client::entry_url(&mirror.base, &entry).unwrap();

        let args = mirror.args(&url);
        assert!(args.contains(&"--mirror".to_string()));
        assert!(args.contains(&"--cut-dirs=2".to_string()));
        assert!(args.contains(&"--directory-prefix=/data/mirror".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "https://ftp.ncbi.nlm.nih.gov/pub/pmc/7f/3c/PMC1.tar.gz"
        );
    }

    /// Test a missing program is a spawn error, not a panic
    #[tokio::test]
    async fn test_missing_program() {
        let mirror = mirror("definitely-not-a-real-wget-binary");
        let entry = RemoteEntry::new(Prefix::new(0, 0), "PMC1.tar.gz");

        let result = mirror.mirror(&entry).await;
        assert!(matches!(result, Err(MirrorError::Spawn { .. })));
    }

    /// Test a failing program maps to a command failure
    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program() {
        let mirror = mirror("false");
        let entry = RemoteEntry::new(Prefix::new(0, 0), "PMC1.tar.gz");

        let result = mirror.mirror(&entry).await;
        assert!(matches!(
            result,
            Err(MirrorError::CommandFailed { status: Some(1), .. })
        ));
    }
}
