//! HTTP helpers shared by the chat, speech and vision clients.

use reqwest::{Response, StatusCode};
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Run a request closure with exponential backoff.
///
/// Retries network errors, 429 (honoring `Retry-After`) and 5xx responses.
/// Other error statuses are returned to the caller to interpret. After the
/// retry budget is spent the last response is returned as-is, or the last
/// network error as a string.
pub async fn request_with_retry<F, Fut>(mut task: F, max_retries: u32) -> Result<Response, String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match task().await {
            Ok(response) => {
                let status = response.status();
                let retryable =
                    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if status.is_success() || !retryable || attempt > max_retries {
                    return Ok(response);
                }

                let wait = retry_after(&response).unwrap_or(backoff);
                tracing::warn!(
                    "[HTTP] Status {}, retrying in {:?} (attempt {}/{})",
                    status,
                    wait,
                    attempt,
                    max_retries
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                if attempt > max_retries {
                    return Err(format!(
                        "request failed after {} attempts: {}",
                        max_retries, e
                    ));
                }
                tracing::warn!(
                    "[HTTP] Network error: {}, retrying in {:?} (attempt {}/{})",
                    e,
                    backoff,
                    attempt,
                    max_retries
                );
                tokio::time::sleep(backoff).await;
            }
        }
        backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// ── Tests ──────────────────────────────────────────────────
