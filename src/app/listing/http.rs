//! Listing over HTTP directory indexes
//!
//! The corpus host serves each prefix as an HTML index page; entries are the
//! `a[href]` link targets that name a file directly inside the prefix.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::session::{ListingConnector, ListingSession};
use crate::app::client::{self, HttpHandler};
use crate::app::models::{Prefix, RemoteEntry};
use crate::constants::remote;
use crate::errors::{ListingError, ListingResult, RemoteError};

/// Opens [`HttpListingSession`]s against one corpus base URL
#[derive(Debug, Clone)]
pub struct HttpListingConnector {
    handler: Arc<HttpHandler>,
    base: Url,
}

impl HttpListingConnector {
    /// Create a connector sharing `handler` (and its rate limit) across sessions
    pub fn new(handler: Arc<HttpHandler>, base: Url) -> Self {
        Self { handler, base }
    }
}

#[async_trait]
impl ListingConnector for HttpListingConnector {
    /// Check the base URL; a session is only handed out if the host answers
    async fn connect(&self) -> ListingResult<Box<dyn ListingSession>> {
        let response = self.handler.get_response(&self.base).await?;
        if !response.status().is_success() {
            return Err(ListingError::SessionSetup {
                reason: format!("HTTP {} from {}", response.status(), self.base),
            });
        }

        debug!("Opened listing session on {}", self.base);
        Ok(Box::new(HttpListingSession {
            handler: Arc::clone(&self.handler),
            base: self.base.clone(),
        }))
    }
}

/// Listing session reading HTTP directory indexes
#[derive(Debug)]
pub struct HttpListingSession {
    handler: Arc<HttpHandler>,
    base: Url,
}

#[async_trait]
impl ListingSession for HttpListingSession {
    async fn list(&mut self, prefix: Prefix) -> ListingResult<Vec<RemoteEntry>> {
        let url = client::prefix_url(&self.base, prefix)?;
        let response = self.handler.get_response(&url).await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(Vec::new()),
            status if !status.is_success() => {
                return Err(RemoteError::ServerError {
                    status: status.as_u16(),
                    url: url.to_string(),
                }
                .into())
            }
            _ => {}
        }

        let html = response.text().await.map_err(RemoteError::from_transport)?;
        parse_listing(prefix, &html)
    }
}

/// Extract the entries of one prefix from its HTML index page
///
/// Skips sort links, parent and absolute links, and subdirectories. Names are
/// percent-decoded and deduplicated in page order.
pub fn parse_listing(prefix: Prefix, html: &str) -> ListingResult<Vec<RemoteEntry>> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(remote::LISTING_LINK_SELECTOR).map_err(|e| ListingError::InvalidListing {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    let entries = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(entry_name)
        .filter(|name| seen.insert(name.clone()))
        .map(|name| RemoteEntry::new(prefix, name))
        .collect();
    Ok(entries)
}

fn entry_name(href: &str) -> Option<String> {
    if href.starts_with(['?', '#', '/']) || href.contains("://") {
        return None;
    }
    let href = href.strip_prefix("./").unwrap_or(href);
    let name = urlencoding::decode(href).ok()?;
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return None;
    }
    Some(name.into_owned())
}
