//! A browser session shared by page objects.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};
use crate::wait::{wait_for_result, WaitConfig};

/// Text served while the application server is still warming up.
pub const SITE_DOWN_MARKER: &str = "The website may be down";

/// Retry policy for initial page loads
#[derive(Debug, Clone, Copy)]
pub struct LoadRetry {
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for LoadRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

/// The driver plus the wait and retry settings every page uses.
#[derive(Clone)]
pub struct BrowserSession {
    driver: Arc<dyn Driver>,
    wait: WaitConfig,
    load_retry: LoadRetry,
}

impl BrowserSession {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            wait: WaitConfig::default(),
            load_retry: LoadRetry::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_load_retry(mut self, load_retry: LoadRetry) -> Self {
        self.load_retry = load_retry;
        self
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn wait_config(&self) -> WaitConfig {
        self.wait
    }

    /// Load `url`. While the server answers with its warm-up page, retry
    /// (when `can_retry`) up to the configured number of attempts.
    pub async fn get(&self, url: &str, can_retry: bool) -> E2eResult<()> {
        let attempts = if can_retry {
            self.load_retry.attempts.max(1)
        } else {
            1
        };

        for attempt in 1..=attempts {
            self.driver.goto(url).await?;
            if !self.driver.page_source().await?.contains(SITE_DOWN_MARKER) {
                debug!("Loaded {}", url);
                return Ok(());
            }
            warn!("{} not ready (attempt {}/{})", url, attempt, attempts);
            if attempt < attempts {
                tokio::time::sleep(self.load_retry.delay).await;
            }
        }

        Err(E2eError::Timeout(format!("{} page to load", url)))
    }

    /// Poll `condition` with the session's wait settings.
    pub async fn wait_until<F, Fut>(&self, description: &str, condition: F) -> E2eResult<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        wait_for_result(condition, self.wait, description).await
    }

    /// Poll `condition` for at most `timeout`.
    pub async fn wait_until_within<F, Fut>(
        &self,
        timeout: Duration,
        description: &str,
        condition: F,
    ) -> E2eResult<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = E2eResult<bool>>,
    {
        let config = WaitConfig::new(timeout, self.wait.poll_interval);
        wait_for_result(condition, config, description).await
    }

    /// Fixed sleep, for animations that expose no completion signal.
    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
