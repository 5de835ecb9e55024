use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::core::errors::{TranslationError, TranslationResult};
use crate::core::types::ProviderKind;

/// A remote translation service tried by the fallback chain
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Translate `text` into `target_language`, returning only the translated text
    async fn translate(&self, text: &str, target_language: &str) -> TranslationResult<String>;
}

/// Create an HTTP client with timeouts and connection pooling
pub(crate) fn build_http_client(timeout: Duration) -> TranslationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(TranslationError::from)
}

/// Whether a non-success status is worth another attempt
fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Exponential backoff with jitter
fn backoff(attempt: u32) -> Duration {
    let base_delay = 500 * 2_u64.pow(attempt);
    let jitter = rand::random::<u64>() % 250;
    Duration::from_millis(base_delay + jitter)
}

/// Send a request with retries and jitter, returning the response body.
///
/// Transport errors, 429 and 5xx responses are retried up to `max_retries`
/// times. Any other non-success status fails immediately.
pub(crate) async fn send_with_retries<F>(
    provider: ProviderKind,
    max_retries: u32,
    request: F,
) -> TranslationResult<String>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut attempt = 0;

    loop {
        match request().send().await {
            Ok(response) if response.status().is_success() => {
                return Ok(response.text().await?);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if attempt < max_retries && is_retryable(status) {
                    debug!(
                        "{} returned {}. Retrying ({}/{})",
                        provider.label(),
                        status,
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                    attempt += 1;
                    continue;
                }

                return Err(TranslationError::ServiceStatus {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                if attempt < max_retries {
                    debug!(
                        "{} request error: {}. Retrying ({}/{})",
                        provider.label(),
                        e,
                        attempt + 1,
                        max_retries
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(e.into());
            }
        }
    }
}
