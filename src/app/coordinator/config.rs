//! Configuration structures for the pipeline coordinator
//!
//! Pool sizes and timeouts for a harvest run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the pipeline coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Number of remote listing workers
    pub listing_workers: usize,
    /// Number of download workers
    pub download_workers: usize,
    /// Idle wait on a queue before a worker exits
    pub queue_timeout: Duration,
    /// Parallelism of the local index build
    pub index_workers: usize,
    /// Time allowed for in-flight items after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listing_workers: workers::DEFAULT_LISTING_WORKERS,
            download_workers: workers::DEFAULT_DOWNLOAD_WORKERS,
            queue_timeout: workers::DEFAULT_QUEUE_TIMEOUT,
            index_workers: workers::DEFAULT_INDEX_WORKERS,
            shutdown_timeout: workers::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl CoordinatorConfig {
    /// Set the listing pool size
    pub fn with_listing_workers(mut self, count: usize) -> Self {
        self.listing_workers = count;
        self
    }

    /// Set the download pool size
    pub fn with_download_workers(mut self, count: usize) -> Self {
        self.download_workers = count;
        self
    }

    /// Set the idle queue timeout
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// Set the index build parallelism
    pub fn with_index_workers(mut self, count: usize) -> Self {
        self.index_workers = count;
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, count) in [
            ("listing_workers", self.listing_workers),
            ("download_workers", self.download_workers),
            ("index_workers", self.index_workers),
        ] {
            validate_pool_size(field, count)?;
        }

        if self.queue_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "queue_timeout",
                "0s",
                "Queue timeout cannot be zero",
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "shutdown_timeout",
                "0s",
                "Shutdown timeout cannot be zero",
            ));
        }

        Ok(())
    }
}

/// Check a pool size is within `1..=MAX_WORKER_COUNT`
pub fn validate_pool_size(field: &str, count: usize) -> ConfigResult<()> {
    if count == 0 {
        return Err(ConfigError::invalid(field, count, "Must be at least 1"));
    }
    if count > workers::MAX_WORKER_COUNT {
        return Err(ConfigError::invalid(
            field,
            count,
            &format!("Must not exceed {}", workers::MAX_WORKER_COUNT),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that default configuration is valid
    ///
    /// The defaults reproduce the pool sizes the harvester has always run with.
    #[test]
    fn test_default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listing_workers, 8);
        assert_eq!(config.download_workers, 48);
        assert_eq!(config.index_workers, 15);
        assert_eq!(config.queue_timeout, Duration::from_secs(3600));
    }

    /// Test configuration builder methods
    #[test]
    fn test_config_builder_methods() {
        let config = CoordinatorConfig::default()
            .with_listing_workers(2)
            .with_download_workers(3)
            .with_index_workers(4)
            .with_queue_timeout(Duration::from_secs(5))
            .with_shutdown_timeout(Duration::from_secs(6));

        assert_eq!(config.listing_workers, 2);
        assert_eq!(config.download_workers, 3);
        assert_eq!(config.index_workers, 4);
        assert_eq!(config.queue_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(6));
        assert!(config.validate().is_ok());
    }

    /// Test configuration validation
    ///
    /// Zero-sized pools and zero timeouts are rejected with the field named.
    #[test]
    fn test_config_validation() {
        let config = CoordinatorConfig::default().with_download_workers(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("download_workers"));

        let config = CoordinatorConfig::default().with_listing_workers(10_000);
        assert!(config.validate().is_err());

        let config = CoordinatorConfig::default().with_queue_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = CoordinatorConfig::default().with_shutdown_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
