//! Playability probe for candidate media URLs
//!
//! Resolved URLs are often short-lived signed links; a provider may hand
//! out one that is already dead. The probe asks for a single byte and
//! accepts any 2xx/3xx answer.

use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::Client;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait UrlValidator: Debug + Send + Sync {
    /// `true` when the URL is worth handing to a player; never an error
    async fn validate(&self, url: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct HttpValidator {
    client: Client,
    timeout: Duration,
}

impl HttpValidator {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Client::new(), timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl UrlValidator for HttpValidator {
    async fn validate(&self, url: &str) -> bool {
        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "probe {}", url);
                (200..400).contains(&status)
            }
            Err(e) => {
                debug!(error = %e, "probe {} failed", url);
                false
            }
        }
    }
}
