//! `ExchangeApi`: the opaque upstream DEX aggregator / RPC collaborator
//! (spec §6.1). Transport is HTTP/JSON; this module defines the trait
//! boundary and strongly-typed request/response structs so downstream code
//! never branches on "which JSON parser succeeded" (Design Notes §9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Baseline and per-operation HTTP timeouts (spec §5).
pub mod timeouts {
    use std::time::Duration;

    pub const BASELINE: Duration = Duration::from_secs(10);
    pub const QUOTE: Duration = Duration::from_secs(20);
    pub const SWAP: Duration = Duration::from_secs(30);
    pub const FUNDING: Duration = Duration::from_secs(45);
    pub const SWEEP: Duration = Duration::from_secs(60);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub in_mint: String,
    pub out_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64,
    /// Opaque route payload the aggregator expects back verbatim on swap.
    pub route: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamStatus {
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    pub status: UpstreamStatus,
    pub transaction_id: Option<String>,
    pub fee_collection: Option<u64>,
    pub new_balance_sol: Option<f64>,
    pub actual_input: Option<f64>,
    pub actual_output: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundChildRequest {
    pub pubkey: String,
    pub amount_sol: f64,
    pub op_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPayload {
    pub parent_secret_bs58: String,
    pub children: Vec<FundChildRequest>,
    pub priority_fee: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundChildOutcome {
    pub pubkey: String,
    pub status: UpstreamStatus,
    pub transaction_id: Option<String>,
    pub successful_bundles: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundResponse {
    pub results: Vec<FundChildOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnAllFundsResponse {
    pub status: UpstreamStatus,
    pub transaction_id: Option<String>,
    pub amount_returned_sol: f64,
    pub child_final_balance_sol: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxConfirmationStatus {
    Confirmed,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusResponse {
    pub status: TxConfirmationStatus,
    pub confirmations: u64,
}

/// Whether a per-child fund outcome should be treated as successful.
/// Resolves spec §9's open question: `status == Success` OR
/// `successful_bundles >= 1` counts as success. Every caller that receives a
/// [`FundChildOutcome`] goes through this one function (currently
/// `FundingEngine::fund`) rather than re-deriving the rule inline.
pub fn is_success(status: UpstreamStatus, successful_bundles: Option<u32>) -> bool {
    status == UpstreamStatus::Success || successful_bundles.unwrap_or(0) >= 1
}

/// The upstream DEX aggregator / balance / funding collaborator (spec §6.1).
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn balance(&self, address: &str) -> anyhow::Result<f64>;

    async fn quote(
        &self,
        in_mint: &str,
        out_mint: &str,
        amount_base_units: u64,
        slippage_bps: u16,
        only_direct: bool,
        as_legacy: bool,
        platform_fee_bps: u16,
    ) -> anyhow::Result<Quote>;

    async fn swap(
        &self,
        secret_bs58: &str,
        quote: &Quote,
        wrap_unwrap_sol: bool,
        as_legacy: bool,
        collect_fees: bool,
        verify: bool,
    ) -> anyhow::Result<SwapResponse>;

    async fn fund(&self, payload: FundPayload) -> anyhow::Result<FundResponse>;

    async fn return_all_funds(
        &self,
        child_secret_bs58: &str,
        parent_pubkey: &str,
    ) -> anyhow::Result<ReturnAllFundsResponse>;

    async fn tx_status(&self, tx_id: &str) -> anyhow::Result<TxStatusResponse>;
}

/// Live `ExchangeApi` implementation over HTTP/JSON. Gated behind the `live`
/// feature so unit/integration tests never need network access.
#[cfg(feature = "live")]
pub mod http {
    use super::*;
    use reqwest::Client;

    pub struct HttpExchangeApi {
        client: Client,
        base_url: String,
    }

    impl HttpExchangeApi {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                base_url: base_url.into(),
            }
        }

        fn parse_response<T: serde::de::DeserializeOwned>(body: &str) -> anyhow::Result<T> {
            serde_json::from_str(body)
                .map_err(|e| anyhow::anyhow!("failed to parse upstream response: {e}"))
        }

        async fn post_json<Req: Serialize, Resp: serde::de::DeserializeOwned>(
            &self,
            path: &str,
            body: &Req,
            timeout: Duration,
        ) -> anyhow::Result<Resp> {
            let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
            let text = self
                .client
                .post(url)
                .json(body)
                .timeout(timeout)
                .send()
                .await?
                .text()
                .await?;
            Self::parse_response(&text)
        }
    }

    #[async_trait]
    impl ExchangeApi for HttpExchangeApi {
        async fn balance(&self, address: &str) -> anyhow::Result<f64> {
            #[derive(Deserialize)]
            struct BalanceResp {
                balance_sol: f64,
            }
            let resp: BalanceResp = self
                .post_json("balance", &serde_json::json!({ "address": address }), timeouts::BASELINE)
                .await?;
            Ok(resp.balance_sol)
        }

        async fn quote(
            &self,
            in_mint: &str,
            out_mint: &str,
            amount_base_units: u64,
            slippage_bps: u16,
            only_direct: bool,
            as_legacy: bool,
            platform_fee_bps: u16,
        ) -> anyhow::Result<Quote> {
            self.post_json(
                "quote",
                &serde_json::json!({
                    "in_mint": in_mint,
                    "out_mint": out_mint,
                    "amount_base_units": amount_base_units,
                    "slippage_bps": slippage_bps,
                    "only_direct": only_direct,
                    "as_legacy": as_legacy,
                    "platform_fee_bps": platform_fee_bps,
                }),
                timeouts::QUOTE,
            )
            .await
        }

        async fn swap(
            &self,
            secret_bs58: &str,
            quote: &Quote,
            wrap_unwrap_sol: bool,
            as_legacy: bool,
            collect_fees: bool,
            verify: bool,
        ) -> anyhow::Result<SwapResponse> {
            self.post_json(
                "swap",
                &serde_json::json!({
                    "secret": secret_bs58,
                    "quote": quote,
                    "wrap_unwrap_sol": wrap_unwrap_sol,
                    "as_legacy": as_legacy,
                    "collect_fees": collect_fees,
                    "verify": verify,
                }),
                timeouts::SWAP,
            )
            .await
        }

        async fn fund(&self, payload: FundPayload) -> anyhow::Result<FundResponse> {
            self.post_json("fund", &payload, timeouts::FUNDING).await
        }

        async fn return_all_funds(
            &self,
            child_secret_bs58: &str,
            parent_pubkey: &str,
        ) -> anyhow::Result<ReturnAllFundsResponse> {
            self.post_json(
                "return_all_funds",
                &serde_json::json!({
                    "child_secret": child_secret_bs58,
                    "parent_pubkey": parent_pubkey,
                }),
                timeouts::SWEEP,
            )
            .await
        }

        async fn tx_status(&self, tx_id: &str) -> anyhow::Result<TxStatusResponse> {
            self.post_json(
                "tx_status",
                &serde_json::json!({ "tx_id": tx_id }),
                timeouts::BASELINE,
            )
            .await
        }
    }
}
