// =============================================================================
// Shared Retry / Error Helpers
// =============================================================================
//
// `safe_db_call`, `safe_kafka_call`, and `safe_redis_call` each wrap a
// fallible operation with a logger callback and return `None` on failure
// instead of propagating — a closure that returns `Option<T>` and never
// unwinds, so a worker's outer loop can log via `on_error` and move on
// without an exception tunnel.
// =============================================================================

use std::time::Duration;
use tracing::warn;

/// Retry an async operation with exponential backoff. `base_delay` doubles on
/// each attempt, up to `attempts` total tries. Returns the first success, or
/// the last error if every attempt fails.
pub async fn retry_with_backoff<T, E, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = base_delay;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "operation failed, retrying");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

/// Run a fallible database operation; on error, invoke `on_error` and return
/// `None` instead of propagating. Used at worker outer loops so one bad
/// message or transient connection failure does not kill the task.
pub async fn safe_db_call<T, E, F, Fut>(context: &str, op: F, on_error: impl FnOnce(&E)) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Some(value),
        Err(e) => {
            on_error(&e);
            warn!(context, "db call failed, continuing");
            None
        }
    }
}

/// Same contract as `safe_db_call`, for Kafka produce/consume operations.
pub async fn safe_kafka_call<T, E, F, Fut>(
    context: &str,
    op: F,
    on_error: impl FnOnce(&E),
) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Some(value),
        Err(e) => {
            on_error(&e);
            warn!(context, "kafka call failed, continuing");
            None
        }
    }
}

/// Same contract as `safe_db_call`, for Redis operations.
pub async fn safe_redis_call<T, E, F, Fut>(
    context: &str,
    op: F,
    on_error: impl FnOnce(&E),
) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Some(value),
        Err(e) => {
            on_error(&e);
            warn!(context, "redis call failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &'static str> = retry_with_backoff(5, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_and_returns_last_error() {
        let result: Result<u32, &'static str> =
            retry_with_backoff(3, Duration::from_millis(1), || async { Err("always fails") }).await;
        assert_eq!(result.unwrap_err(), "always fails");
    }

    #[tokio::test]
    async fn safe_db_call_returns_none_on_error_without_panicking() {
        let mut logged = false;
        let result: Option<u32> = safe_db_call(
            "test_ctx",
            || async { Err::<u32, &'static str>("boom") },
            |_e| logged = true,
        )
        .await;
        assert!(result.is_none());
        assert!(logged);
    }
}
