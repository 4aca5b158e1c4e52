//! Shared request loop for provider calls.
//!
//! Retries on 429 (rate limit), 5xx and transport errors with exponential
//! backoff. Any other non-success status is returned immediately with the
//! upstream error message extracted from the body.

use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::ProviderError;

pub const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;

/// Sends the request built by `build` and deserializes the JSON body, retrying
/// transient failures. `build` is called once per attempt.
pub async fn send_json<T, F>(label: &str, build: F) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let body = send_with_retry(label, &build, BASE_DELAY_MS).await?;
    serde_json::from_str(&body).map_err(ProviderError::Parse)
}

/// Like `send_json` but returns the raw body text on success.
pub async fn send_text<F>(label: &str, build: F) -> Result<String, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    send_with_retry(label, &build, BASE_DELAY_MS).await
}

async fn send_with_retry<F>(label: &str, build: &F, base_delay_ms: u64) -> Result<String, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    retry_loop(label, base_delay_ms, move || async move {
        let response = build().send().await.map_err(|e| Attempt::Retry(ProviderError::Http(e)))?;
        classify(label, response).await
    })
    .await
}

/// Outcome of one failed attempt.
enum Attempt {
    Retry(ProviderError),
    Fatal(ProviderError),
}

async fn retry_loop<F, Fut>(label: &str, base_delay_ms: u64, mut attempt_fn: F) -> Result<String, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, Attempt>>,
{
    let mut last_error: Option<ProviderError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s
            let delay = Duration::from_millis(base_delay_ms * (1 << (attempt - 1)));
            warn!(
                provider = label,
                "Provider call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        match attempt_fn().await {
            Ok(body) => {
                debug!(provider = label, attempt, "Provider call succeeded");
                return Ok(body);
            }
            Err(Attempt::Retry(e)) => last_error = Some(e),
            Err(Attempt::Fatal(e)) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(ProviderError::RateLimited {
        retries: MAX_RETRIES,
    }))
}

async fn classify(label: &str, response: Response) -> Result<String, Attempt> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 || status.is_server_error() {
        warn!(provider = label, "Provider API returned {}: {}", status, body);
        return Err(Attempt::Retry(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(&body, label, status.as_u16()),
        }));
    }

    if !status.is_success() {
        return Err(Attempt::Fatal(ProviderError::Api {
            status: status.as_u16(),
            message: api_error_message(&body, label, status.as_u16()),
        }));
    }

    Ok(body)
}

/// Upstream error message: `error.message`, a string `error`, or `message`;
/// otherwise `"<label> error: <status>"`.
pub fn api_error_message(body: &str, label: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let found = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| v.get("error").and_then(Value::as_str))
            .or_else(|| v.get("message").and_then(Value::as_str))
            .map(str::to_string)
    });
    found.unwrap_or_else(|| format!("{label} error: {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_api_error_message_shapes() {
        assert_eq!(
            api_error_message(r#"{"error":{"message":"quota habis"}}"#, "Gemini", 403),
            "quota habis"
        );
        assert_eq!(
            api_error_message(r#"{"error":"Model is loading"}"#, "HF", 503),
            "Model is loading"
        );
        assert_eq!(api_error_message(r#"{"message":"bad"}"#, "HF", 400), "bad");
        assert_eq!(api_error_message("<html>", "OpenAI", 502), "OpenAI error: 502");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_loop_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_loop("test", 10, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Attempt::Retry(ProviderError::Api {
                        status: 503,
                        message: "busy".into(),
                    }))
                } else {
                    Ok("ok".to_string())
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_loop_stops_on_fatal() {
        let calls = AtomicU32::new(0);
        let result = retry_loop("test", 10, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<String, _>(Attempt::Fatal(ProviderError::Api {
                    status: 401,
                    message: "invalid key".into(),
                }))
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_loop_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_loop("test", 10, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<String, _>(Attempt::Retry(ProviderError::Api {
                    status: 429,
                    message: "slow down".into(),
                }))
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Api { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }
}
