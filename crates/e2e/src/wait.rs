//! Bounded polling.
//!
//! A wait re-evaluates its condition every `poll_interval` until the
//! condition holds or `timeout` elapses, then fails with `Timeout`.

use crate::error::{E2eError, E2eResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default timeout for page waits
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Custom timeout, default poll interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Wait for `condition` to return true.
pub async fn wait_for<F, Fut>(condition: F, config: WaitConfig, description: &str) -> E2eResult<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() >= config.timeout {
            return Err(E2eError::Timeout(description.to_string()));
        }

        sleep(config.poll_interval).await;
    }
}

/// Wait for a fallible `condition` to return `Ok(true)`.
///
/// Errors count as "not yet": the element may not be rendered. The last
/// error is kept in the timeout message.
pub async fn wait_for_result<F, Fut>(
    condition: F,
    config: WaitConfig,
    description: &str,
) -> E2eResult<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let start = Instant::now();
    let mut last_error = None;

    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) => last_error = None,
            Err(e) => last_error = Some(e),
        }

        if start.elapsed() >= config.timeout {
            let description = match last_error {
                Some(e) => format!("{} (last error: {})", description, e),
                None => description.to_string(),
            };
            return Err(E2eError::Timeout(description));
        }

        sleep(config.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick() -> WaitConfig {
        WaitConfig::new(Duration::from_millis(100), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_wait_for_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let polled = counter.clone();

        wait_for(
            move || {
                let c = polled.clone();
                async move { c.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            WaitConfig::with_timeout(Duration::from_secs(5)),
            "counter >= 3",
        )
        .await
        .unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let result = wait_for(|| async { false }, quick(), "impossible condition").await;
        match result {
            Err(E2eError::Timeout(what)) => assert_eq!(what, "impossible condition"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_for_result_keeps_last_error() {
        let result = wait_for_result(
            || async { Err(E2eError::NoSuchElement("id \"banner\"".to_string())) },
            quick(),
            "banner",
        )
        .await;
        match result {
            Err(E2eError::Timeout(what)) => {
                assert_eq!(what, "banner (last error: No such element: id \"banner\")")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(WaitConfig::default().timeout, Duration::from_secs(15));
    }
}
