//! Retry helpers and small text utilities.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Retry a Telegram API operation with exponential backoff and jitter.
///
/// Intended for transient network failures; gives up after five attempts.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn retry_telegram_operation<T, F, Fut>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let strategy = ExponentialBackoff::from_millis(250)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(5);

    Retry::spawn(strategy, || async {
        match operation().await {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("Telegram operation failed, will retry: {e}");
                Err(e)
            }
        }
    })
    .await
}

/// Truncate a string to at most `max_chars` characters, respecting char
/// boundaries.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32> = retry_telegram_operation(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow::anyhow!("transient"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("नमस्ते", 3), "नमस");
        assert_eq!(truncate_str("hello", 10), "hello");
    }
}
