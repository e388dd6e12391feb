//! In-crate test double for [`ExchangeApi`], used by unit tests across
//! modules. Integration tests under `tests/` define their own richer mock in
//! `tests/helpers/mod.rs` since they link against the library as a
//! downstream crate.
#![cfg(test)]

use crate::exchange_api::{
    ExchangeApi, FundChildOutcome, FundPayload, FundResponse, Quote, ReturnAllFundsResponse,
    SwapResponse, TxConfirmationStatus, TxStatusResponse, UpstreamStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockExchangeApi {
    balances: Mutex<HashMap<String, f64>>,
    quote_calls: Mutex<u32>,
}

impl MockExchangeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, address: &str, balance: f64) {
        self.balances
            .get_mut()
            .unwrap()
            .insert(address.to_string(), balance);
    }

    pub fn quote_call_count(&self) -> u32 {
        *self.quote_calls.lock().unwrap()
    }
}

#[async_trait]
impl ExchangeApi for MockExchangeApi {
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
            price_impact_pct: 0.1,
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
        Ok(SwapResponse {
            status: UpstreamStatus::Success,
            transaction_id: Some("mock-tx".to_string()),
            fee_collection: None,
            new_balance_sol: None,
            actual_input: Some(quote.in_amount as f64),
            actual_output: Some(quote.out_amount as f64),
            error: None,
        })
    }

    async fn fund(&self, payload: FundPayload) -> anyhow::Result<FundResponse> {
        Ok(FundResponse {
            results: payload
                .children
                .iter()
                .map(|c| FundChildOutcome {
                    pubkey: c.pubkey.clone(),
                    status: UpstreamStatus::Success,
                    transaction_id: Some("mock-fund-tx".to_string()),
                    successful_bundles: Some(1),
                    error: None,
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
            transaction_id: Some("mock-sweep-tx".to_string()),
            amount_returned_sol: 0.0,
            child_final_balance_sol: 0.0,
            error: None,
        })
    }

    async fn tx_status(&self, _tx_id: &str) -> anyhow::Result<TxStatusResponse> {
        Ok(TxStatusResponse {
            status: TxConfirmationStatus::Confirmed,
            confirmations: 32,
        })
    }
}
