//! HTTP client wrapper with connection pooling and bounded retries, shared
//! by [`crate::checker::JsonUpdateChecker`] and
//! [`crate::downloader::HttpCrxDownloader`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use ceu_config::NetworkConfig;

/// Wraps a pooled [`reqwest::Client`] with the retry policy every
/// collaborator in this crate shares.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retries: u32,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest` client cannot be built.
    pub fn new(config: &NetworkConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("ceu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            retries: config.retries,
        })
    }

    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Runs `f` up to `1 + retries` times, retrying on timeouts, connect
    /// failures and server (5xx) responses. A 429 is never retried here: the
    /// caller is expected to surface `Retry-After` to the throttle instead.
    pub async fn retry<F, Fut>(&self, mut f: F) -> Result<Response, reqwest::Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500) * attempt).await;
            }

            match f().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    return Ok(response);
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error = response.error_for_status().err();
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.expect("loop runs at least once"))
    }
}
