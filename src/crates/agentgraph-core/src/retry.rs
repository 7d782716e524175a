//! Retry policies - jittered exponential backoff for transient node failures
//!
//! A [`RetryPolicy`] decides how many attempts a node gets and how long the
//! runner sleeps between them; a [`RetryClassifier`] decides which errors are
//! worth retrying at all.
//!
//! The delay for attempt `n` (1-based, first retry is `n = 1`) is:
//!
//! ```text
//! base     = initial_delay × backoff_multiplier^(n−1)
//! capped   = min(base, max_delay)
//! jittered = capped × (1 + U(−jitter_factor, +jitter_factor))
//! ```
//!
//! With `jitter_factor = 0` the sequence is deterministic; with
//! `backoff_multiplier = 1` delays are fixed; with a multiplier above 1 they
//! grow exponentially until the cap. Jitter spreads simultaneous retries so
//! a shared dependency that just recovered is not immediately hammered by
//! every waiting run at once.

use crate::error::GraphError;
use rand::Rng;
use std::time::Duration;

/// Backoff configuration for retrying failed node executions
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Multiplier applied per retry; 1.0 gives fixed delays
    pub backoff_multiplier: f64,

    /// Jitter amplitude in [0, 1]; 0 disables jitter
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    /// 3 attempts, 500ms initial, doubling, capped at 30s, 10% jitter
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a policy allowing the given number of attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Single attempt, no retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the jitter factor, clamped to [0, 1]
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter_factor > 0.0 {
            let spread = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            capped * (1.0 + spread)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Classifies which errors are worth retrying
///
/// The runner consults the classifier after every node failure; routing and
/// state-machine errors bypass it entirely and never retry.
pub trait RetryClassifier: Send + Sync {
    /// Whether the runner should retry after this error
    fn should_retry(&self, error: &GraphError) -> bool;
}

/// Default classification: execution failures retry, everything else does not
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn should_retry(&self, error: &GraphError) -> bool {
        matches!(error, GraphError::Execution { .. })
    }
}
