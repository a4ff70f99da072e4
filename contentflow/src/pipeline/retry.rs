//! Retry delays with exponential backoff.
//!
//! The orchestrator blocks on [`RetryStrategy::wait`] before each retry, so
//! tests can substitute a strategy that records attempts instead of sleeping.

use crate::cancellation::CancellationToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

/// Configuration for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Returns `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// A retry wait was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("retry wait cancelled")]
pub struct WaitCancelled;

/// Sleeps for `delay`, returning early if `cancel` fires.
///
/// # Errors
///
/// Returns [`WaitCancelled`] if the token is or becomes cancelled.
pub async fn sleep_or_cancel(
    cancel: &CancellationToken,
    delay: Duration,
) -> Result<(), WaitCancelled> {
    if cancel.is_cancelled() {
        return Err(WaitCancelled);
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => Err(WaitCancelled),
    }
}

/// Decides how long to wait before a retry, and waits.
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay reported for retry `attempt` (1 for the first retry).
    ///
    /// Only used for the `delay_ms` field of `step.retrying`; the wait
    /// itself goes through [`RetryStrategy::wait`].
    fn delay_for(&self, attempt: u32) -> Duration {
        RetryConfig::default().delay_for(attempt)
    }

    /// Blocks before retry `attempt`.
    ///
    /// # Errors
    ///
    /// Returns [`WaitCancelled`] if the token is or becomes cancelled.
    async fn wait(&self, cancel: &CancellationToken, attempt: u32) -> Result<(), WaitCancelled> {
        sleep_or_cancel(cancel, self.delay_for(attempt)).await
    }
}

/// The default retry strategy: `base * 2^attempt`, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    /// Creates a strategy with the given base and cap.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self::from_config(
            RetryConfig::new()
                .with_base_delay_ms(u64::try_from(base.as_millis()).unwrap_or(u64::MAX))
                .with_max_delay_ms(u64::try_from(max.as_millis()).unwrap_or(u64::MAX)),
        )
    }

    /// Creates a strategy from a retry config.
    #[must_use]
    pub fn from_config(config: RetryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RetryStrategy for ExponentialBackoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.config.delay_for(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 10_000);
    }

    #[test]
    fn test_exponential_delays() {
        let backoff = ExponentialBackoff::default();
        let delays: Vec<u128> = (0..=4).map(|k| backoff.delay_for(k).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_exponential_capped() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(10), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"base_delay_ms": 5}"#).unwrap();
        assert_eq!(config.base_delay_ms, 5);
        assert_eq!(config.max_delay_ms, 10_000);
    }

    #[tokio::test]
    async fn test_wait_completes() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2));
        let token = CancellationToken::new();
        assert_eq!(backoff.wait(&token, 1).await, Ok(()));
    }

    #[tokio::test]
    async fn test_wait_already_cancelled() {
        let backoff = ExponentialBackoff::default();
        let token = CancellationToken::new();
        token.cancel("stop");
        assert_eq!(backoff.wait(&token, 1).await, Err(WaitCancelled));
    }

    #[tokio::test]
    async fn test_wait_interrupted_by_cancel() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(30));
        let token = Arc::new(CancellationToken::new());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel("shutdown");
        });

        let started = std::time::Instant::now();
        assert_eq!(backoff.wait(&token, 1).await, Err(WaitCancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
