//! Test double for `ExchangeApi` shared by the integration tests. A
//! separate copy from `src/mock.rs` since integration tests link against
//! the library as a downstream crate and cannot see its `#[cfg(test)]`
//! items.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use wallet_swap_orchestrator::exchange_api::{
    is_success, ExchangeApi, FundChildOutcome, FundPayload, FundResponse, Quote,
    ReturnAllFundsResponse, SwapResponse, TxConfirmationStatus, TxStatusResponse, UpstreamStatus,
};

#[derive(Clone, Copy, Debug)]
pub enum SwapBehavior {
    AlwaysSucceed,
    FailTimes(u32),
    AlwaysFail(&'static str),
}

pub struct ScriptedExchangeApi {
    balances: Mutex<HashMap<String, f64>>,
    swap_behavior: SwapBehavior,
    swap_attempts: Mutex<u32>,
    fund_timeout_once: Mutex<bool>,
    quote_calls: Mutex<u32>,
}

impl ScriptedExchangeApi {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            swap_behavior: SwapBehavior::AlwaysSucceed,
            swap_attempts: Mutex::new(0),
            fund_timeout_once: Mutex::new(false),
            quote_calls: Mutex::new(0),
        }
    }

    pub fn with_swap_behavior(mut self, behavior: SwapBehavior) -> Self {
        self.swap_behavior = behavior;
        self
    }

    pub fn set_balance(&self, address: &str, balance: f64) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), balance);
    }

    pub fn credit(&self, address: &str, amount: f64) {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(address.to_string()).or_insert(0.0) += amount;
    }

    pub fn debit(&self, address: &str, amount: f64) {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(address.to_string()).or_insert(0.0) -= amount;
    }

    pub fn quote_call_count(&self) -> u32 {
        *self.quote_calls.lock().unwrap()
    }

    /// Make the next `fund` call fail as if it had timed out upstream.
    pub fn arm_fund_timeout_once(&self) {
        *self.fund_timeout_once.lock().unwrap() = true;
    }
}

impl Default for ScriptedExchangeApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeApi for ScriptedExchangeApi {
    async fn balance(&self, address: &str) -> anyhow::Result<f64> {
        Ok(*self.balances.lock().unwrap().get(address).unwrap_or(&0.0))
    }

    async fn quote(
        &self,
        in_mint: &str,
        out_mint: &str,
        amount_base_units: u64,
        _slippage_bps: u16,
        _only_direct: bool,
        _as_legacy: bool,
        _platform_fee_bps: u16,
    ) -> anyhow::Result<Quote> {
        *self.quote_calls.lock().unwrap() += 1;
        Ok(Quote {
            in_mint: in_mint.to_string(),
            out_mint: out_mint.to_string(),
            in_amount: amount_base_units,
            out_amount: (amount_base_units as f64 * 0.98) as u64,
            price_impact_pct: 0.2,
            route: serde_json::json!({}),
        })
    }

    async fn swap(
        &self,
        _secret_bs58: &str,
        quote: &Quote,
        _wrap_unwrap_sol: bool,
        _as_legacy: bool,
        _collect_fees: bool,
        _verify: bool,
    ) -> anyhow::Result<SwapResponse> {
        let mut attempts = self.swap_attempts.lock().unwrap();
        *attempts += 1;

        match self.swap_behavior {
            SwapBehavior::AlwaysSucceed => Ok(SwapResponse {
                status: UpstreamStatus::Success,
                transaction_id: Some(format!("tx-{}", *attempts)),
                fee_collection: None,
                new_balance_sol: None,
                actual_input: Some(quote.in_amount as f64 / 1e9),
                actual_output: Some(quote.out_amount as f64 / 1e9),
                error: None,
            }),
            SwapBehavior::FailTimes(n) => {
                if *attempts <= n {
                    Ok(SwapResponse {
                        status: UpstreamStatus::Failed,
                        transaction_id: None,
                        fee_collection: None,
                        new_balance_sol: None,
                        actual_input: None,
                        actual_output: None,
                        error: Some("network timeout while submitting transaction".to_string()),
                    })
                } else {
                    Ok(SwapResponse {
                        status: UpstreamStatus::Success,
                        transaction_id: Some(format!("tx-{}", *attempts)),
                        fee_collection: None,
                        new_balance_sol: None,
                        actual_input: Some(quote.in_amount as f64 / 1e9),
                        actual_output: Some(quote.out_amount as f64 / 1e9),
                        error: None,
                    })
                }
            }
            SwapBehavior::AlwaysFail(reason) => Ok(SwapResponse {
                status: UpstreamStatus::Failed,
                transaction_id: None,
                fee_collection: None,
                new_balance_sol: None,
                actual_input: None,
                actual_output: None,
                error: Some(reason.to_string()),
            }),
        }
    }

    async fn fund(&self, payload: FundPayload) -> anyhow::Result<FundResponse> {
        let mut timeout_once = self.fund_timeout_once.lock().unwrap();
        if *timeout_once {
            *timeout_once = false;
            anyhow::bail!("network timeout while submitting fund transaction");
        }

        Ok(FundResponse {
            results: payload
                .children
                .iter()
                .map(|c| {
                    self.credit(&c.pubkey, c.amount_sol);
                    FundChildOutcome {
                        pubkey: c.pubkey.clone(),
                        status: UpstreamStatus::Success,
                        transaction_id: Some("fund-tx".to_string()),
                        successful_bundles: Some(1),
                        error: None,
                    }
                })
                .collect(),
        })
    }

    async fn return_all_funds(
        &self,
        _child_secret_bs58: &str,
        _parent_pubkey: &str,
    ) -> anyhow::Result<ReturnAllFundsResponse> {
        Ok(ReturnAllFundsResponse {
            status: UpstreamStatus::Success,
            transaction_id: Some("sweep-tx".to_string()),
            amount_returned_sol: 0.0,
            child_final_balance_sol: 0.0,
            error: None,
        })
    }

    async fn tx_status(&self, _tx_id: &str) -> anyhow::Result<TxStatusResponse> {
        // Defaults to not-yet-confirmed: this double has no transaction
        // ledger, so it cannot honestly report a specific tx as confirmed.
        // Scenarios that need an upstream-confirmed sweep arrange that via
        // `return_all_funds`'s own status/amount instead.
        Ok(TxStatusResponse {
            status: TxConfirmationStatus::Pending,
            confirmations: 0,
        })
    }
}

/// Sanity check that the crate's `is_success` resolution is reachable from
/// integration tests (used by a couple of scenario assertions).
pub fn fund_outcome_is_success(outcome: &FundChildOutcome) -> bool {
    is_success(outcome.status, outcome.successful_bundles)
}
