//! Low level HTTP access shared by the provider clients
//!
//! One [`HttpApi`] per endpoint: it owns the base URL, the per-request
//! timeout and the retry policy, and turns every response into either a
//! decoded payload or a [`ProviderError`].

use crate::error::classify;
use crate::retry::RetryPolicy;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tfsource::{ProviderError, Result};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) struct HttpApi {
    client: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpApi {
    pub(crate) fn new(client: Client, base_url: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `endpoint` with query `params`, retrying once on transient failure
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let url = url.as_str();

        self.retry
            .run(endpoint, move || async move {
                debug!("GET {} with {} params", url, params.len());

                let response = self
                    .client
                    .get(url)
                    .query(params)
                    .timeout(self.timeout)
                    .send()
                    .await
                    .map_err(classify)?;

                self.handle_response(response).await
            })
            .await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("API error ({}): {}", status.as_u16(), error_text);
            return Err(ProviderError::from_status_code(status.as_u16(), error_text));
        }

        let text = response.text().await.map_err(classify)?;
        let json: Value = serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            ProviderError::Decode(e)
        })?;

        // NetEase style APIs answer 200 with an error code in the body
        if let Some(code) = json.get("code").and_then(Value::as_i64) {
            if code != 200 {
                let message = json
                    .get("msg")
                    .or_else(|| json.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string();
                warn!(code, "API error in body: {}", message);
                return Err(body_error(code, message));
            }
        }

        Ok(serde_json::from_value(json)?)
    }
}

fn body_error(code: i64, message: String) -> ProviderError {
    match u16::try_from(code) {
        Ok(code) => ProviderError::from_status_code(code, message),
        // negative codes (-460 anti-crawler, ...) carry no HTTP meaning
        Err(_) => ProviderError::Api { code: 0, message: format!("{} ({})", message, code) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_removed() {
        let api = HttpApi::new(
            Client::new(),
            "http://localhost:3000/",
            Duration::from_secs(1),
            RetryPolicy::none(),
        );
        assert_eq!(api.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_negative_body_code() {
        match body_error(-460, "cheating".into()) {
            ProviderError::Api { code, message } => {
                assert_eq!(code, 0);
                assert!(message.contains("-460"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
