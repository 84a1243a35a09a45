//! Politeness delay between live fetches

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;

/// Uniformly random pause between two live fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    min: Duration,
    max: Duration,
}

impl PolitenessDelay {
    /// Creates a delay range; bounds given in the wrong order are swapped
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::from_millis(config.min_delay_ms, config.max_delay_ms)
    }

    /// A zero-length delay
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws one delay from `[min, max]`
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Sleeps for one sampled delay
    ///
    /// # Returns
    ///
    /// * `true` - The full delay elapsed
    /// * `false` - Shutdown was signalled while sleeping
    pub async fn wait(&self, shutdown: Option<&mut watch::Receiver<bool>>) -> bool {
        let delay = self.sample();
        tracing::debug!("Politeness delay: {} ms", delay.as_millis());

        match shutdown {
            Some(rx) => {
                if *rx.borrow() {
                    return false;
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => true,
                    _ = wait_for_shutdown(rx) => false,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

impl Default for PolitenessDelay {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Resolves once the flag turns true; pends forever if the sender is gone
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
