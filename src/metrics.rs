//! Optional Prometheus counters for swap/funding/sweep outcomes, gated
//! behind the `metrics` feature (spec §9 design notes).

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub struct Metrics {
    pub registry: Registry,
    pub swap_attempts: IntCounter,
    pub swap_successes: IntCounter,
    pub swap_retries: IntCounter,
    pub funding_outcomes: IntCounterVec,
    pub sweep_outcomes: IntCounterVec,
}

fn build() -> Metrics {
    let registry = Registry::new();

    let swap_attempts = IntCounter::with_opts(Opts::new(
        "swap_attempts_total",
        "Total swap attempts issued across all wallets",
    ))
    .expect("static metric options are valid");
    let swap_successes = IntCounter::with_opts(Opts::new(
        "swap_successes_total",
        "Total swaps that completed successfully",
    ))
    .expect("static metric options are valid");
    let swap_retries = IntCounter::with_opts(Opts::new(
        "swap_retries_total",
        "Total swap retry attempts",
    ))
    .expect("static metric options are valid");
    let funding_outcomes = IntCounterVec::new(
        Opts::new("funding_outcomes_total", "Funding run outcomes by status"),
        &["status"],
    )
    .expect("static metric options are valid");
    let sweep_outcomes = IntCounterVec::new(
        Opts::new("sweep_outcomes_total", "Sweep outcomes by verified/unverified"),
        &["verified"],
    )
    .expect("static metric options are valid");

    for collector in [
        Box::new(swap_attempts.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(swap_successes.clone()),
        Box::new(swap_retries.clone()),
        Box::new(funding_outcomes.clone()),
        Box::new(sweep_outcomes.clone()),
    ] {
        registry
            .register(collector)
            .expect("each collector is registered exactly once");
    }

    Metrics {
        registry,
        swap_attempts,
        swap_successes,
        swap_retries,
        funding_outcomes,
        sweep_outcomes,
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(build)
}

pub fn record_swap_attempt() {
    metrics().swap_attempts.inc();
}

pub fn record_swap_success() {
    metrics().swap_successes.inc();
}

pub fn record_swap_retry() {
    metrics().swap_retries.inc();
}

pub fn record_funding_outcome(status: &str) {
    metrics()
        .funding_outcomes
        .with_label_values(&[status])
        .inc();
}

pub fn record_sweep_outcome(verified: bool) {
    metrics()
        .sweep_outcomes
        .with_label_values(&[if verified { "verified" } else { "unverified" }])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_are_registered() {
        record_swap_attempt();
        record_swap_success();
        record_swap_retry();
        record_funding_outcome("Success");
        record_sweep_outcome(true);

        let families = metrics().registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "swap_attempts_total"));
        assert!(families.iter().any(|f| f.get_name() == "sweep_outcomes_total"));
    }
}
