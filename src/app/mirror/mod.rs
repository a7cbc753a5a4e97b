//! Mirroring collaborators
//!
//! A [`Mirror`] fetches one remote archive to
//! `<root>/<hh>/<hh>/<name>`. Any error means the archive is not reliably
//! present; the caller still runs the archive processor to clean up.

use async_trait::async_trait;

use crate::app::models::RemoteEntry;
use crate::errors::MirrorResult;

pub mod http;
pub mod wget;

pub use self::http::HttpMirror;
pub use self::wget::WgetMirror;

/// Fetches remote archives into the local mirror
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Mirror one remote entry to its local path
    async fn mirror(&self, entry: &RemoteEntry) -> MirrorResult<()>;

    /// Whether the backend leaves `.listing` files in prefix directories
    fn leaves_listing_artifacts(&self) -> bool {
        false
    }
}
