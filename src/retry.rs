//! Retry policy derived from an error's [`ErrorCategory`].
//!
//! Generalizes the teacher's single `RetryPolicy` (fixed exponential backoff)
//! into a per-category table: each category carries its own attempt cap and
//! delay formula, per the classification design.

use crate::error::ErrorCategory;
use rand::Rng;
use std::time::Duration;

/// Decision returned by [`RetryPolicy::decide`] for a given attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Retry after sleeping for `delay`.
    Retry { delay: Duration },
    /// Stop; attempts are exhausted or the category is not retryable.
    Stop,
}

/// Per-category retry policy, attempt-number is 0-based (the first attempt
/// is attempt 0; `max_attempts` counts total attempts including the first).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Maximum total attempts (including the initial one) for a category.
    pub fn max_attempts(category: ErrorCategory) -> u32 {
        match category {
            ErrorCategory::Network => 4,
            ErrorCategory::RateLimit => 3,
            ErrorCategory::Chain | ErrorCategory::Slippage | ErrorCategory::Quote => 3,
            ErrorCategory::Unknown => 2,
            ErrorCategory::Balance | ErrorCategory::Auth => 1,
        }
    }

    /// Base delay (before jitter) for retrying attempt `n` (0-based, the
    /// attempt number that just failed) of `category`.
    fn base_delay(category: ErrorCategory, n: u32) -> Duration {
        let secs = match category {
            ErrorCategory::Network => (2f64.powi(n as i32)).min(10.0),
            ErrorCategory::RateLimit => (5.0 * (n as f64 + 1.0)).min(15.0),
            ErrorCategory::Chain | ErrorCategory::Slippage | ErrorCategory::Quote => {
                (3.0 * (n as f64 + 1.0)).min(8.0)
            }
            ErrorCategory::Unknown => 2.0,
            ErrorCategory::Balance | ErrorCategory::Auth => 0.0,
        };
        Duration::from_secs_f64(secs)
    }

    /// Add jitter in `[0.1*d, 0.3*d]` to a base delay.
    fn with_jitter(base: Duration) -> Duration {
        if base.is_zero() {
            return base;
        }
        let mut rng = rand::thread_rng();
        let factor: f64 = rng.gen_range(0.1..=0.3);
        base + Duration::from_secs_f64(base.as_secs_f64() * factor)
    }

    /// Decide whether attempt number `attempt_number` (0-based, the attempt
    /// that just failed with `category`) should be retried.
    pub fn decide(category: ErrorCategory, attempt_number: u32) -> RetryDecision {
        if !category.is_retryable() {
            return RetryDecision::Stop;
        }
        let max = Self::max_attempts(category);
        if attempt_number + 1 >= max {
            return RetryDecision::Stop;
        }
        let delay = Self::with_jitter(Self::base_delay(category, attempt_number));
        RetryDecision::Retry { delay }
    }
}
