//! JSON-over-HTTP helper shared by the embedding and language-model
//! clients.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Why a request ultimately failed.
#[derive(Debug, Error)]
pub(crate) enum PostError {
    /// Non-success HTTP status, with the response body.
    #[error("HTTP {0}: {1}")]
    Status(u16, String),
    /// Connection refused, timeout, DNS, ...
    #[error("network error: {0}")]
    Network(String),
    /// The body was not JSON.
    #[error("invalid JSON response: {0}")]
    Decode(String),
}

pub(crate) fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POST `body` to `url`, retrying transient failures up to `max_retries`
/// times, and decode the JSON response.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, PostError> {
    let mut last_err = PostError::Network("request was never sent".to_string());

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(url, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| PostError::Decode(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();
                last_err = PostError::Status(status.as_u16(), body_text);
                if status.as_u16() != 429 && !status.is_server_error() {
                    return Err(last_err);
                }
            }
            Err(e) => last_err = PostError::Network(e.to_string()),
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_error_messages() {
        assert_eq!(
            PostError::Status(429, "slow down".to_string()).to_string(),
            "HTTP 429: slow down"
        );
        assert_eq!(
            PostError::Network("connection refused".to_string()).to_string(),
            "network error: connection refused"
        );
        assert_eq!(
            PostError::Decode("expected value".to_string()).to_string(),
            "invalid JSON response: expected value"
        );
    }
}
