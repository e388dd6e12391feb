//! Parent→children disbursement with balance-evidence fallback (spec §4.H).

use crate::exchange_api::{is_success, ExchangeApi, FundChildRequest, FundPayload, FundResponse};
use crate::types::{ChildFundingOutcome, FundingResult, FundingStatus};
use crate::verifier;
use md5::{Digest, Md5};
use std::collections::HashSet;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const ALREADY_FUNDED_RATIO: f64 = 0.8;
const WAIT_AFTER_OK_SECS: u64 = 20;
const WAIT_AFTER_TIMEOUT_SECS: u64 = 25;
const VERIFY_MAX_WAIT_SECS: u64 = 120;
const VERIFY_POLL_INTERVAL_SECS: u64 = 10;
const PARENT_DELTA_RECLASSIFY_RATIO: f64 = 0.5;
const FUND_TIMEOUT: Duration = Duration::from_secs(45);

pub struct ChildToFund {
    pub address: String,
    pub secret_key_bs58: String,
    pub required_amount: f64,
}

/// Deterministic idempotency key from `(parent, child, amount, hour_bucket)`
/// (spec §4.H.2). MD5, confirmed against `original_source` rather than
/// guessed.
pub fn idempotency_key(parent: &str, child: &str, amount: f64, now: SystemTime) -> String {
    let hour_bucket = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 3600;
    let input = format!("{parent}:{child}:{amount}:{hour_bucket}");
    let digest = Md5::digest(input.as_bytes());
    format!("{digest:x}")
}

pub struct FundingEngine<'a> {
    api: &'a dyn ExchangeApi,
    fund_timeout: Duration,
    wait_after_ok: Duration,
    wait_after_timeout: Duration,
    verify_max_wait: Duration,
    verify_poll_interval: Duration,
}

impl<'a> FundingEngine<'a> {
    pub fn new(api: &'a dyn ExchangeApi) -> Self {
        Self {
            api,
            fund_timeout: FUND_TIMEOUT,
            wait_after_ok: Duration::from_secs(WAIT_AFTER_OK_SECS),
            wait_after_timeout: Duration::from_secs(WAIT_AFTER_TIMEOUT_SECS),
            verify_max_wait: Duration::from_secs(VERIFY_MAX_WAIT_SECS),
            verify_poll_interval: Duration::from_secs(VERIFY_POLL_INTERVAL_SECS),
        }
    }

    /// Override the wait/verification timings, e.g. to keep tests fast.
    /// Production callers should use [`Self::new`].
    pub fn with_timing(
        api: &'a dyn ExchangeApi,
        fund_timeout: Duration,
        wait_after_ok: Duration,
        wait_after_timeout: Duration,
        verify_max_wait: Duration,
        verify_poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            fund_timeout,
            wait_after_ok,
            wait_after_timeout,
            verify_max_wait,
            verify_poll_interval,
        }
    }

    pub async fn fund(
        &self,
        parent_address: &str,
        parent_secret_bs58: &str,
        children: &[ChildToFund],
        verify: bool,
    ) -> anyhow::Result<FundingResult> {
        let start = Instant::now();
        let now = SystemTime::now();

        let mut seen = HashSet::new();
        let mut to_fund = Vec::new();
        let mut outcomes = Vec::new();

        for child in children {
            if !seen.insert(child.address.clone()) {
                warn!(address = %child.address, "duplicate child in funding request, skipping");
                continue;
            }

            let current_balance = self.api.balance(&child.address).await.unwrap_or(0.0);
            if current_balance >= ALREADY_FUNDED_RATIO * child.required_amount {
                outcomes.push(ChildFundingOutcome {
                    child_address: child.address.clone(),
                    required_amount: child.required_amount,
                    already_funded: true,
                    newly_funded: false,
                    verified: true,
                    transaction_id: None,
                    error: None,
                });
                continue;
            }

            to_fund.push(child);
        }

        if to_fund.is_empty() {
            return Ok(FundingResult {
                status: FundingStatus::Success,
                children: outcomes,
                duration: start.elapsed(),
                reclassified_by_parent_delta: false,
            });
        }

        let parent_initial_balance = self.api.balance(parent_address).await.unwrap_or(0.0);
        let mut initial_balances = Vec::with_capacity(to_fund.len());
        for child in &to_fund {
            initial_balances.push(self.api.balance(&child.address).await.unwrap_or(0.0));
        }

        let payload = FundPayload {
            parent_secret_bs58: parent_secret_bs58.to_string(),
            children: to_fund
                .iter()
                .map(|c| FundChildRequest {
                    pubkey: c.address.clone(),
                    amount_sol: c.required_amount,
                    op_id: idempotency_key(parent_address, &c.address, c.required_amount, now),
                })
                .collect(),
            priority_fee: None,
        };

        let call_result = tokio::time::timeout(self.fund_timeout, self.api.fund(payload)).await;

        let mut fund_response: Option<FundResponse> = None;
        let (timed_out, call_ok) = match call_result {
            Ok(Ok(response)) => {
                fund_response = Some(response);
                (false, true)
            }
            Ok(Err(e)) => {
                // A networky upstream error (e.g. the request itself timed
                // out before our wrapper's deadline) carries the same
                // possibly-submitted semantics as a hard timeout.
                let looks_like_timeout =
                    crate::error::classify(&e.to_string()) == crate::error::ErrorCategory::Network;
                warn!(error = %e, "fund call returned an error");
                (looks_like_timeout, false)
            }
            Err(_) => {
                warn!("fund call timed out, treating transactions as possibly submitted");
                (true, false)
            }
        };

        let wait = if timed_out {
            self.wait_after_timeout
        } else {
            self.wait_after_ok
        };
        tokio::time::sleep(wait).await;

        let expected_total_spend: f64 = to_fund.iter().map(|c| c.required_amount).sum();

        let mut newly_funded_count = 0usize;
        for (child, initial) in to_fund.iter().zip(initial_balances.iter()) {
            let target = initial + child.required_amount;

            let upstream_outcome = fund_response
                .as_ref()
                .and_then(|r| r.results.iter().find(|o| o.pubkey == child.address));
            let upstream_confirmed = upstream_outcome
                .map(|o| is_success(o.status, o.successful_bundles))
                .unwrap_or(false);
            let upstream_tx_id = upstream_outcome.and_then(|o| o.transaction_id.clone());

            let outcome = if upstream_confirmed {
                verifier::VerificationOutcome {
                    verified: true,
                    initial: *initial,
                    r#final: target,
                    target,
                    delta: child.required_amount,
                    duration: Duration::ZERO,
                    history: Vec::new(),
                    partial: false,
                }
            } else if verify {
                verifier::watch_async(
                    self.api,
                    &child.address,
                    *initial,
                    target,
                    self.verify_max_wait,
                    self.verify_poll_interval,
                )
                .await
            } else {
                verifier::VerificationOutcome {
                    verified: call_ok,
                    initial: *initial,
                    r#final: *initial,
                    target,
                    delta: 0.0,
                    duration: Duration::ZERO,
                    history: Vec::new(),
                    partial: false,
                }
            };

            if outcome.verified {
                newly_funded_count += 1;
            }

            outcomes.push(ChildFundingOutcome {
                child_address: child.address.clone(),
                required_amount: child.required_amount,
                already_funded: false,
                newly_funded: outcome.verified,
                verified: outcome.verified,
                transaction_id: upstream_tx_id,
                error: if outcome.verified {
                    None
                } else {
                    Some("verification did not observe expected balance delta".to_string())
                },
            });
        }

        // Cross-check via parent delta (spec §4.H.7): if nothing verified as
        // newly-funded but the parent balance dropped enough, reclassify.
        let mut reclassified = false;
        if newly_funded_count == 0 {
            let parent_final_balance = self.api.balance(parent_address).await.unwrap_or(parent_initial_balance);
            let parent_delta = parent_initial_balance - parent_final_balance;
            if parent_delta >= PARENT_DELTA_RECLASSIFY_RATIO * expected_total_spend {
                info!(
                    parent_delta,
                    expected_total_spend, "reclassifying children as funded based on parent balance delta"
                );
                reclassified = true;
                let fund_start = outcomes.len() - to_fund.len();
                for outcome in outcomes.iter_mut().skip(fund_start) {
                    outcome.newly_funded = true;
                    outcome.verified = true;
                    outcome.error = None;
                }
                newly_funded_count = to_fund.len();
            }
        }

        let total_children = outcomes.len();
        let successful_children = outcomes
            .iter()
            .filter(|o| o.already_funded || o.newly_funded)
            .count();

        let status = if successful_children == total_children {
            FundingStatus::Success
        } else if successful_children > 0 {
            FundingStatus::PartialSuccess
        } else if timed_out {
            FundingStatus::TimeoutPendingVerification
        } else {
            FundingStatus::Failed
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record_funding_outcome(&format!("{status:?}"));

        let _ = newly_funded_count;

        Ok(FundingResult {
            status,
            children: outcomes,
            duration: start.elapsed(),
            reclassified_by_parent_delta: reclassified,
        })
    }
}
