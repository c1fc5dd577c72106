//! Bounded retry with exponential backoff and full jitter.
//!
//! Wraps calls to the external TTS program and encoder. Only errors that
//! [`GreetError::is_transient`] accepts are retried.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// The last error is returned unmodified.
pub fn with_retry<T, F>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt);
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {}ms: {}",
                    operation,
                    attempt + 1,
                    config.max_retries + 1,
                    delay.as_millis(),
                    e
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// base * 2^attempt capped at max, then a uniform draw in [base, capped].
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp_delay.min(config.max_delay_ms);
    let floor = config.base_delay_ms.min(capped);
    let ms = if capped > floor {
        rand::thread_rng().gen_range(floor..=capped)
    } else {
        capped
    };
    Duration::from_millis(ms)
}
