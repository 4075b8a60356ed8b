//! Shared back-off for the hosting service's rate limit
//!
//! Every worker talks to the API through one [`RateLimitGate`]. When any of
//! them is refused, the gate closes for the cooldown and all workers wait
//! before their next request instead of hammering the service in parallel.

use crate::config::RateLimitConfig;
use crate::core::{RmuError, RmuResult};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long to back off and how often to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    /// `None` retries until the run is cancelled or its deadline passes.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(cooldown: Duration) -> Self {
        Self {
            cooldown,
            max_retries: None,
        }
    }

    pub fn bounded(cooldown: Duration, max_retries: u32) -> Self {
        Self {
            cooldown,
            max_retries: Some(max_retries),
        }
    }

    /// Whether another attempt is allowed after `retries` refusals
    pub fn allows_retry(&self, retries: u32) -> bool {
        self.max_retries.map_or(true, |max| retries < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(60))
    }
}

impl From<&RateLimitConfig> for RetryPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            cooldown: Duration::from_secs(config.cooldown_secs),
            max_retries: config.max_retries,
        }
    }
}

/// Process-wide "closed until" marker for rate-limited requests
#[derive(Debug)]
pub struct RateLimitGate {
    reopen_at: Mutex<Option<Instant>>,
    policy: RetryPolicy,
}

impl RateLimitGate {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            reopen_at: Mutex::new(None),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Close the gate for one cooldown from now. Never shortens an existing closure.
    pub async fn trip(&self) -> Instant {
        let mut reopen_at = self.reopen_at.lock().await;
        let candidate = Instant::now() + self.policy.cooldown;
        let next = match *reopen_at {
            Some(current) => current.max(candidate),
            None => candidate,
        };
        *reopen_at = Some(next);
        next
    }

    /// Block until the gate is open, or fail with `Cancelled` if `cancel` fires first
    pub async fn wait_open(&self, cancel: &CancellationToken) -> RmuResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(RmuError::Cancelled);
            }

            let reopen_at = *self.reopen_at.lock().await;
            let Some(at) = reopen_at else {
                return Ok(());
            };
            if at <= Instant::now() {
                return Ok(());
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(RmuError::Cancelled),
                _ = tokio::time::sleep_until(at) => {}
            }
            // Another worker may have pushed the reopen time while we slept.
        }
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
