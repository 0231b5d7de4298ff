use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Runs `operation` until it succeeds, doubling the pause between attempts.
///
/// `attempts` counts the first try. Only used while establishing a
/// connection; individual store calls are never retried.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    attempts: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Attempt {} of {} failed: {}. Retrying in {:?}...",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<usize, String> = retry_with_backoff(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("fail {n}"))
                } else {
                    Ok(n)
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with_backoff(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
