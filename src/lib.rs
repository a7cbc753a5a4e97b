//! PMC Harvester Library
//!
//! Mirrors the PMC open-access article package tree and reduces every
//! downloaded archive to a canonical directory holding the article PDF and
//! its NXML metadata, both named after the article identifier.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(workers::DEFAULT_LISTING_WORKERS, 8);
        assert_eq!(prefixes::PREFIX_COUNT, 65_536);
        assert!(http::USER_AGENT.contains("PMC-Harvester"));
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::from(errors::PipelineError::ShutdownTimeout { seconds: 5 });

        assert_eq!(app_error.category(), "pipeline");
        assert_eq!(app_error.to_string(), "Shutdown timeout after 5 seconds");
    }
}
