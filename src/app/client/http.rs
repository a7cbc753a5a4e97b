//! Core HTTP operations with rate limiting and retry logic
//!
//! Every remote request of the harvester goes through [`HttpHandler`], which
//! applies a process-wide rate limit and backs off on 429/503 responses.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, Response};
use url::Url;

use crate::constants::limits;
use crate::errors::{RemoteError, RemoteResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::ClientSetup`] if `rate_limit_rps` is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> RemoteResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> RemoteResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps)
            .ok_or_else(|| RemoteError::ClientSetup("Rate limit must be non-zero".to_string()))?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Fetches the HTTP response with rate limiting and retry logic
    ///
    /// Returns the raw response whatever its status, except that 429 and 503
    /// are retried with exponential backoff. Transport errors are retried the
    /// same way and then classified with [`RemoteError::from_transport`].
    pub async fn get_response(&self, url: &Url) -> RemoteResult<Response> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(
                limits::RATE_LIMIT_JITTER_MS,
            )))
            .await;

        let mut retries = 0;
        loop {
            match self.client.get(url.as_str()).send().await {
                Ok(response) if response.status() == 429 => {
                    if retries >= limits::MAX_RETRIES {
                        return Err(RemoteError::RateLimitExceeded);
                    }
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Rate limited by server (429). Backing off for {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) if response.status() == 503 => {
                    if retries >= limits::MAX_RETRIES {
                        return Err(RemoteError::ServerOverloaded);
                    }
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Server overloaded (503). Backing off for {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => {
                    tracing::debug!("Fetched {} ({})", url, response.status());
                    return Ok(response);
                }
                Err(e) if retries < limits::MAX_RETRIES => {
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        url,
                        retries,
                        limits::MAX_RETRIES,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(RemoteError::from_transport(e)),
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(limits::RETRY_BASE_DELAY_MS * 2_u64.pow(attempt))
}
