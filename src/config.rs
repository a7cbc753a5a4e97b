//! Configuration management for PMC Harvester
//!
//! Settings come from a TOML file found in the standard locations, with
//! every field defaulted so the harvester runs with no file at all. Each
//! section converts into the runtime configuration of one component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::app::coordinator::config::validate_pool_size;
use crate::app::CoordinatorConfig;
use crate::constants::{config, http, limits, logging, mirror, remote, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local mirror settings
    pub mirror: MirrorConfigToml,
    /// Remote corpus and HTTP client settings
    pub remote: RemoteConfigToml,
    /// Harvest pipeline settings
    pub pipeline: PipelineConfigToml,
    /// Standalone cleaning pass settings
    pub batch: BatchConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// How archives are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorBackend {
    /// External `wget --mirror` per archive
    Wget,
    /// In-process HTTP download
    Http,
}

/// TOML-friendly mirror configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfigToml {
    /// Local mirror root holding `<hh>/<hh>` prefix directories
    pub root: PathBuf,
    /// Download backend
    pub backend: MirrorBackend,
    /// Program run by the wget backend
    pub wget_program: String,
}

impl Default for MirrorConfigToml {
    fn default() -> Self {
        Self {
            root: PathBuf::from(mirror::DEFAULT_ROOT),
            backend: MirrorBackend::Wget,
            wget_program: mirror::WGET_PROGRAM.to_string(),
        }
    }
}

/// TOML-friendly remote configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfigToml {
    /// Base URL of the archive tree
    pub base_url: String,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit across all workers (requests per second)
    pub rate_limit_rps: u32,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for RemoteConfigToml {
    fn default() -> Self {
        Self {
            base_url: remote::BASE_URL.to_string(),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

impl RemoteConfigToml {
    /// Convert to the HTTP client configuration
    pub fn to_runtime_config(&self) -> ConfigResult<ClientConfig> {
        if self.rate_limit_rps == 0 {
            return Err(ConfigError::invalid(
                "rate_limit_rps",
                0,
                "Rate limit must be non-zero",
            ));
        }
        for (field, timeout) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::invalid(field, "0s", "Timeout cannot be zero"));
            }
        }

        Ok(ClientConfig {
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            pool_max_per_host: self.pool_max_per_host,
            ..ClientConfig::default()
        })
    }
}

/// TOML-friendly pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfigToml {
    /// Remote listing workers
    pub listing_workers: usize,
    /// Download workers
    pub download_workers: usize,
    /// Local index build parallelism
    pub index_workers: usize,
    /// Idle wait on a queue before a worker exits
    #[serde(with = "humantime_serde")]
    pub queue_timeout: Duration,
    /// Grace period for in-flight items after a shutdown signal
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfigToml {
    fn default() -> Self {
        Self {
            listing_workers: workers::DEFAULT_LISTING_WORKERS,
            download_workers: workers::DEFAULT_DOWNLOAD_WORKERS,
            index_workers: workers::DEFAULT_INDEX_WORKERS,
            queue_timeout: workers::DEFAULT_QUEUE_TIMEOUT,
            shutdown_timeout: workers::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PipelineConfigToml {
    /// Convert to the coordinator configuration
    pub fn to_runtime_config(&self) -> ConfigResult<CoordinatorConfig> {
        let config = CoordinatorConfig::default()
            .with_listing_workers(self.listing_workers)
            .with_download_workers(self.download_workers)
            .with_index_workers(self.index_workers)
            .with_queue_timeout(self.queue_timeout)
            .with_shutdown_timeout(self.shutdown_timeout);
        config.validate()?;
        Ok(config)
    }
}

/// TOML-friendly cleaning pass configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfigToml {
    /// Prefix directories cleaned concurrently
    pub clean_workers: usize,
}

impl Default for BatchConfigToml {
    fn default() -> Self {
        Self {
            clean_workers: workers::DEFAULT_CLEAN_WORKERS,
        }
    }
}

impl BatchConfigToml {
    /// Validated cleaning parallelism
    pub fn to_runtime_config(&self) -> ConfigResult<usize> {
        validate_pool_size("clean_workers", self.clean_workers)?;
        Ok(self.clean_workers)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise the first file found among
    /// `./pmc-harvester.toml`, the user config directory, and
    /// `/etc/pmc-harvester/config.toml` is used, falling back to defaults.
    pub async fn load(config_file_override: Option<&Path>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path.to_path_buf()),
            Some(path) => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found in standard locations, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Standard configuration file locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!("./{}", config::LOCAL_CONFIG_FILE))];
        if let Ok(user) = Self::get_default_config_path() {
            paths.push(user);
        }
        #[cfg(unix)]
        paths.push(
            PathBuf::from("/etc")
                .join(config::APP_CONFIG_DIR)
                .join(config::CONFIG_FILE_NAME),
        );
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        let found = Self::search_paths().into_iter().find(|path| path.exists());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDirectory)?;
        Ok(config_dir
            .join(config::APP_CONFIG_DIR)
            .join(config::CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Apply the `--root` command line override
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.mirror.root = root;
        }
        self
    }
}
