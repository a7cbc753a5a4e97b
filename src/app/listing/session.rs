//! Remote listing collaborator seams
//!
//! A [`ListingConnector`] is shared by the whole listing pool and opens one
//! [`ListingSession`] per worker. Sessions are never shared between workers.

use async_trait::async_trait;

use crate::app::models::{Prefix, RemoteEntry};
use crate::errors::ListingResult;

/// Persistent listing session owned by a single worker
#[async_trait]
pub trait ListingSession: Send {
    /// List every entry directly under `prefix`
    ///
    /// A prefix that does not exist remotely lists as empty.
    async fn list(&mut self, prefix: Prefix) -> ListingResult<Vec<RemoteEntry>>;
}

/// Factory for listing sessions
#[async_trait]
pub trait ListingConnector: Send + Sync {
    /// Open a new session
    async fn connect(&self) -> ListingResult<Box<dyn ListingSession>>;
}
