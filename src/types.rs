//! Shared result/summary types that flow from the run to the Reporter
//! (out of core): [`SwapAttempt`], [`SwapResult`], [`BatchResult`],
//! [`ExecutionSummary`], [`FundingResult`], [`SweepResult`] (spec §3).

use crate::amount::AmountPlan;
use crate::error::ErrorCategory;
use crate::exchange_api::Quote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapStatus {
    Pending,
    QuoteRequested,
    QuoteReceived,
    Executing,
    Success,
    Failed,
    Skipped,
    Retrying,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SwapStatus,
    pub error: Option<String>,
    pub transaction_id: Option<String>,
    pub quote: Option<Quote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResult {
    pub wallet_index: usize,
    pub wallet_address: String,
    pub input_token: String,
    pub output_token: String,
    pub input_amount: f64,
    pub attempts: Vec<SwapAttempt>,
    pub status: SwapStatus,
    pub transaction_id: Option<String>,
    pub actual_input: Option<f64>,
    pub actual_output: Option<f64>,
    pub price_impact: Option<f64>,
    pub fee_collected: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub final_error: Option<String>,
    pub error_class: Option<ErrorCategory>,
}

impl SwapResult {
    /// Invariant (spec §8.2): `status == Success` implies a transaction id
    /// is present and the last attempt succeeded.
    pub fn check_success_invariant(&self) -> bool {
        if self.status != SwapStatus::Success {
            return true;
        }
        self.transaction_id.is_some()
            && self
                .attempts
                .last()
                .map(|a| a.status == SwapStatus::Success)
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub total_volume_in: f64,
    pub total_volume_out: f64,
    pub average_price_impact: f64,
    pub total_fees_collected: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_index: usize,
    pub results: Vec<SwapResult>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_wallets: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub overall_success_rate: f64,
    pub volume_summary: VolumeSummary,
    pub error_histogram: HashMap<String, usize>,
    pub batch_results: Vec<BatchResult>,
    /// Every amount plan computed for this run, including ones later
    /// filtered out as invalid — the full per-wallet audit trail from the
    /// amount pipeline (spec §6.4).
    pub amount_calculations: Vec<AmountPlan>,
    pub swap_results: Vec<SwapResult>,
    #[serde(with = "duration_millis")]
    pub total_duration: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

impl ExecutionSummary {
    /// Build a summary from a completed run's swap results.
    pub fn from_results(
        results: Vec<SwapResult>,
        batch_results: Vec<BatchResult>,
        amount_calculations: Vec<AmountPlan>,
        total_duration: Duration,
    ) -> Self {
        let total_wallets = results.len();
        let successful = results.iter().filter(|r| r.status == SwapStatus::Success).count();
        let failed = results.iter().filter(|r| r.status == SwapStatus::Failed).count();
        let skipped = results.iter().filter(|r| r.status == SwapStatus::Skipped).count();

        let overall_success_rate = if total_wallets > 0 {
            successful as f64 / total_wallets as f64 * 100.0
        } else {
            0.0
        };

        let mut volume = VolumeSummary::default();
        let mut impact_sum = 0.0;
        let mut impact_count = 0usize;
        for r in &results {
            if let Some(actual_in) = r.actual_input {
                volume.total_volume_in += actual_in;
            }
            if let Some(actual_out) = r.actual_output {
                volume.total_volume_out += actual_out;
            }
            if let Some(fee) = r.fee_collected {
                volume.total_fees_collected += fee;
            }
            if let Some(impact) = r.price_impact {
                impact_sum += impact;
                impact_count += 1;
            }
        }
        volume.average_price_impact = if impact_count > 0 {
            impact_sum / impact_count as f64
        } else {
            0.0
        };

        let mut error_histogram: HashMap<String, usize> = HashMap::new();
        for r in &results {
            if let Some(class) = r.error_class {
                *error_histogram.entry(class.to_string()).or_insert(0) += 1;
            }
        }

        Self {
            total_wallets,
            successful,
            failed,
            skipped,
            overall_success_rate,
            volume_summary: volume,
            error_histogram,
            batch_results,
            amount_calculations,
            swap_results: results,
            total_duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingStatus {
    Success,
    PartialSuccess,
    TimeoutPendingVerification,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildFundingOutcome {
    pub child_address: String,
    pub required_amount: f64,
    pub already_funded: bool,
    pub newly_funded: bool,
    pub verified: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingResult {
    pub status: FundingStatus,
    pub children: Vec<ChildFundingOutcome>,
    pub duration: Duration,
    pub reclassified_by_parent_delta: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub child_address: String,
    pub returned_amount: f64,
    pub final_child_balance: f64,
    pub transaction_id: Option<String>,
    pub verified: bool,
    pub error: Option<String>,
}
