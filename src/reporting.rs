//! Run reporting and projections (spec §6.4): a JSON `RunReport` is the
//! normative artifact; CSV and YAML are read-only projections of it.

use crate::config::SwapConfig;
use crate::types::ExecutionSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub configuration: SwapConfig,
    pub execution_summary: ExecutionSummary,
}

impl RunReport {
    pub fn new(configuration: SwapConfig, execution_summary: ExecutionSummary, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            configuration,
            execution_summary,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Flatten `swap_results` into one CSV row per wallet (spec §6.4).
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "wallet_index",
            "wallet_address",
            "status",
            "input_amount",
            "actual_output",
            "price_impact",
            "transaction_id",
            "error",
        ])?;
        for r in &self.execution_summary.swap_results {
            writer.write_record(&[
                r.wallet_index.to_string(),
                r.wallet_address.clone(),
                format!("{:?}", r.status),
                r.input_amount.to_string(),
                r.actual_output.map(|v| v.to_string()).unwrap_or_default(),
                r.price_impact.map(|v| v.to_string()).unwrap_or_default(),
                r.transaction_id.clone().unwrap_or_default(),
                r.final_error.clone().unwrap_or_default(),
            ])?;
        }
        let bytes = writer.into_inner()?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_csv()?)?;
        Ok(())
    }

    pub fn write_yaml(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Human-readable console summary, in the teacher's markdown-report style.
    pub fn format_markdown(&self) -> String {
        let s = &self.execution_summary;
        let mut out = String::new();
        let _ = writeln!(out, "# Swap Run Report");
        let _ = writeln!(out, "Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(out);
        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out, "- Total wallets: {}", s.total_wallets);
        let _ = writeln!(out, "- Successful: {}", s.successful);
        let _ = writeln!(out, "- Failed: {}", s.failed);
        let _ = writeln!(out, "- Skipped: {}", s.skipped);
        let _ = writeln!(out, "- Success rate: {:.1}%", s.overall_success_rate);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Volume");
        let _ = writeln!(out, "- Total in: {:.6}", s.volume_summary.total_volume_in);
        let _ = writeln!(out, "- Total out: {:.6}", s.volume_summary.total_volume_out);
        let _ = writeln!(
            out,
            "- Average price impact: {:.4}%",
            s.volume_summary.average_price_impact
        );
        let _ = writeln!(
            out,
            "- Fees collected: {:.6}",
            s.volume_summary.total_fees_collected
        );
        if !s.error_histogram.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Errors");
            for (category, count) in &s.error_histogram {
                let _ = writeln!(out, "- {category}: {count}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::AmountStrategy;
    use crate::config::{ExecutionMode, Operation, SelectionPolicy};
    use std::time::Duration;

    fn sample_config() -> SwapConfig {
        SwapConfig {
            operation: Operation::Buy,
            input_token: "SOL".into(),
            output_token: "USDC".into(),
            amount_strategy: AmountStrategy::Fixed { amount: 0.1 },
            execution_mode: ExecutionMode::Sequential,
            selection_policy: SelectionPolicy::All,
            slippage_bps: 50,
            verify: true,
            collect_fees: false,
            dry_run: false,
            max_retries: 3,
            delay_between_swaps_secs: 0.5,
            delay_between_batches_secs: 2.0,
            min_balance_threshold: 0.001,
        }
    }

    #[test]
    fn json_roundtrips() {
        let summary = ExecutionSummary::from_results(Vec::new(), Vec::new(), Vec::new(), Duration::ZERO);
        let report = RunReport::new(sample_config(), summary, Utc::now());
        let json = report.to_json().unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.execution_summary.total_wallets, 0);
    }

    #[test]
    fn csv_has_header_and_no_rows_when_empty() {
        let summary = ExecutionSummary::from_results(Vec::new(), Vec::new(), Vec::new(), Duration::ZERO);
        let report = RunReport::new(sample_config(), summary, Utc::now());
        let csv = report.to_csv().unwrap();
        assert!(csv.starts_with("wallet_index"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn yaml_serializes_without_error() {
        let summary = ExecutionSummary::from_results(Vec::new(), Vec::new(), Vec::new(), Duration::ZERO);
        let report = RunReport::new(sample_config(), summary, Utc::now());
        assert!(report.to_yaml().is_ok());
    }
}
