//! HTTP access to the remote corpus
//!
//! - `config`: HTTP client configuration and building
//! - `http`: rate-limited requests with backoff
//!
//! The helpers below resolve prefixes and entries against the corpus base URL.

use url::Url;

use crate::app::models::{Prefix, RemoteEntry};
use crate::errors::{RemoteError, RemoteResult};

pub mod config;
pub mod http;

#[cfg(test)]
pub(crate) mod test_server;

pub use config::ClientConfig;
pub use http::HttpHandler;

/// Parse the corpus base URL, forcing a trailing slash so joins stay below it
pub fn parse_base_url(base: &str) -> RemoteResult<Url> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&normalized).map_err(|e| RemoteError::InvalidUrl {
        url: base.to_string(),
        error: e.to_string(),
    })
}

/// Directory index URL of a prefix: `<base>/<hh>/<hh>/`
pub fn prefix_url(base: &Url, prefix: Prefix) -> RemoteResult<Url> {
    join(base, &format!("{}/", prefix))
}

/// Download URL of a remote entry, with the name percent-encoded
pub fn entry_url(base: &Url, entry: &RemoteEntry) -> RemoteResult<Url> {
    join(
        base,
        &format!("{}/{}", entry.prefix, urlencoding::encode(&entry.name)),
    )
}

fn join(base: &Url, relative: &str) -> RemoteResult<Url> {
    base.join(relative).map_err(|e| RemoteError::InvalidUrl {
        url: format!("{}{}", base, relative),
        error: e.to_string(),
    })
}
