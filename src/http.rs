//! JSON-over-HTTP helper shared by the embedding and language model clients.

use std::time::Duration;

use tracing::debug;

use crate::error::CapabilityError;

pub fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POSTs `body` to `url` and returns the decoded JSON reply.
///
/// Transient failures (network errors, 429, 5xx) are retried up to
/// `max_retries` times with exponential backoff (1s, 2s, 4s, ... capped at
/// 32s). Other failures return immediately.
pub async fn post_json<B: serde::Serialize + ?Sized>(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    bearer: Option<&str>,
    body: &B,
    max_retries: u32,
) -> Result<serde_json::Value, CapabilityError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let err = match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<serde_json::Value>().await.map_err(|e| {
                        CapabilityError::rejected(service, format!("invalid JSON reply: {}", e))
                    });
                }
                let body_text = response.text().await.unwrap_or_default();
                CapabilityError::from_status(service, status, &body_text)
            }
            Err(e) => CapabilityError::unavailable(
                service,
                format!("connection error (is the service running at {}?): {}", url, e),
            ),
        };

        if !err.is_transient() {
            return Err(err);
        }
        last_err = Some(err);
    }

    Err(last_err
        .unwrap_or_else(|| CapabilityError::unavailable(service, "request failed after retries")))
}
