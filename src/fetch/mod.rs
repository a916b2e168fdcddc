//! Remote resource fetching
//!
//! This module provides:
//! - Deterministic URL derivation per resource class
//! - A transport abstraction with a reqwest-backed implementation
//! - The politeness delay between requests
//! - The consecutive-failure circuit breaker

mod breaker;
mod locator;
mod rate_limit;
#[cfg(test)]
pub(crate) mod testing;

pub use breaker::*;
pub use locator::*;
pub use rate_limit::*;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// A single network retrieval returning parsed JSON
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// HTTP transport over reqwest
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                label: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Sequential fetcher: one request at a time, spaced by the politeness delay
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    spacer: RequestSpacer,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, request_delay: Duration) -> Self {
        Self {
            transport,
            spacer: RequestSpacer::new(request_delay),
        }
    }

    /// Build the HTTP-backed fetcher from configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.request_delay()))
    }

    /// Fetch one resource, feeding the outcome into the run's breaker.
    ///
    /// Returns `Error::Fetch` for an ordinary failure and
    /// `Error::CircuitBreaker` once the consecutive-failure threshold is hit.
    pub async fn fetch(
        &self,
        url: &str,
        label: &str,
        breaker: &mut CircuitBreaker,
    ) -> Result<Value> {
        self.spacer.wait().await;
        debug!("Fetching {}: {}", label, url);

        match self.transport.get_json(url).await {
            Ok(payload) => {
                breaker.record_success();
                debug!("Downloaded {}", label);
                Ok(payload)
            }
            Err(e) => {
                let reason = match e {
                    Error::Fetch { reason, .. } => reason,
                    other => other.to_string(),
                };
                if breaker.record_failure() {
                    error!(
                        "{} consecutive failures, last on {}: {}",
                        breaker.consecutive_failures(),
                        label,
                        reason
                    );
                    Err(Error::CircuitBreaker {
                        failures: breaker.consecutive_failures(),
                        last_error: reason,
                    })
                } else {
                    warn!("Failed {}: {}", label, reason);
                    Err(Error::Fetch {
                        label: label.to_string(),
                        reason,
                    })
                }
            }
        }
    }

    /// Fetch outside of any run (connection probes)
    pub async fn probe(&self, url: &str) -> Result<Value> {
        self.spacer.wait().await;
        self.transport.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_fetcher() -> Fetcher {
        let mut config = FetchConfig::default();
        config.timeout_secs = 5;
        config.request_delay_ms = 0;
        Fetcher::from_config(&config).expect("fetcher should build")
    }

    #[tokio::test]
    async fn test_http_fetch_success_resets_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nowloading/nowloading_us.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"d1": "Hello"})))
            .mount(&server)
            .await;

        let fetcher = http_fetcher();
        let mut breaker = CircuitBreaker::new(3);
        breaker.record_failure();

        let url = format!("{}/nowloading/nowloading_us.json", server.uri());
        let payload = fetcher
            .fetch(&url, "nowloading_us.json", &mut breaker)
            .await
            .unwrap();

        assert_eq!(payload["d1"], "Hello");
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_http_failures_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = http_fetcher();
        let mut breaker = CircuitBreaker::new(3);
        let url = format!("{}/missing/missing.json", server.uri());

        for _ in 0..2 {
            let err = fetcher.fetch(&url, "missing", &mut breaker).await.unwrap_err();
            assert!(matches!(err, Error::Fetch { .. }));
            assert!(!err.is_fatal());
        }

        let err = fetcher.fetch(&url, "missing", &mut breaker).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("3 consecutive failures"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let fetcher = http_fetcher();
        let mut breaker = CircuitBreaker::new(3);
        let url = format!("{}/a/a.json", server.uri());
        assert!(fetcher.fetch(&url, "a", &mut breaker).await.is_err());
        assert_eq!(breaker.consecutive_failures(), 1);
    }
}
