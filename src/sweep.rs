//! Child→parent reclamation with layered verification (spec §4.I).

use crate::exchange_api::{ExchangeApi, TxConfirmationStatus, UpstreamStatus};
use crate::types::SweepResult;
use crate::verifier;
use std::time::Duration;
use tracing::{info, warn};

const BALANCE_DELTA_THRESHOLD: f64 = 5e-4;
const PARENT_VERIFY_MAX_WAIT: Duration = Duration::from_secs(60);
const PARENT_VERIFY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct SweepEngine<'a> {
    api: &'a dyn ExchangeApi,
    parent_verify_max_wait: Duration,
    parent_verify_poll_interval: Duration,
}

impl<'a> SweepEngine<'a> {
    pub fn new(api: &'a dyn ExchangeApi) -> Self {
        Self {
            api,
            parent_verify_max_wait: PARENT_VERIFY_MAX_WAIT,
            parent_verify_poll_interval: PARENT_VERIFY_POLL_INTERVAL,
        }
    }

    /// Alternate constructor with injectable parent-watch timing, for tests
    /// that would otherwise block on the real spec constants.
    pub fn with_timing(
        api: &'a dyn ExchangeApi,
        parent_verify_max_wait: Duration,
        parent_verify_poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            parent_verify_max_wait,
            parent_verify_poll_interval,
        }
    }

    /// Sweep a single child's funds back to `parent_address`, trying each
    /// verification signal in order until one confirms or all are exhausted
    /// (spec §4.I.2): upstream status, tx_status poll, child balance delta,
    /// parent-side balance watch.
    pub async fn sweep_child(
        &self,
        parent_address: &str,
        child_address: &str,
        child_secret_bs58: &str,
    ) -> SweepResult {
        let result = self
            .sweep_child_inner(parent_address, child_address, child_secret_bs58)
            .await;
        #[cfg(feature = "metrics")]
        crate::metrics::record_sweep_outcome(result.verified);
        result
    }

    async fn sweep_child_inner(
        &self,
        parent_address: &str,
        child_address: &str,
        child_secret_bs58: &str,
    ) -> SweepResult {
        let initial_child_balance = self.api.balance(child_address).await.unwrap_or(0.0);
        let parent_initial_balance = self.api.balance(parent_address).await.unwrap_or(0.0);

        let response = match self
            .api
            .return_all_funds(child_secret_bs58, parent_address)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(address = %child_address, error = %e, "return_all_funds call failed");
                return SweepResult {
                    child_address: child_address.to_string(),
                    returned_amount: 0.0,
                    final_child_balance: initial_child_balance,
                    transaction_id: None,
                    verified: false,
                    error: Some(e.to_string()),
                };
            }
        };

        // Rent-exemption failures and similar upstream errors are preserved
        // verbatim rather than reclassified.
        if response.status == UpstreamStatus::Failed {
            let final_balance = self
                .api
                .balance(child_address)
                .await
                .unwrap_or(initial_child_balance);
            return SweepResult {
                child_address: child_address.to_string(),
                returned_amount: 0.0,
                final_child_balance: final_balance,
                transaction_id: response.transaction_id,
                verified: false,
                error: response.error,
            };
        }

        // 1. Trust an explicit upstream success status outright, even when
        // the reported amount is zero (the upstream may not echo the amount
        // back on every success path).
        if response.status == UpstreamStatus::Success {
            info!(
                address = %child_address,
                amount = response.amount_returned_sol,
                "sweep confirmed by upstream status"
            );
            return SweepResult {
                child_address: child_address.to_string(),
                returned_amount: response.amount_returned_sol,
                final_child_balance: response.child_final_balance_sol,
                transaction_id: response.transaction_id.clone(),
                verified: true,
                error: None,
            };
        }

        // 2. Poll tx_status if we have a transaction id.
        if let Some(tx_id) = &response.transaction_id {
            if let Ok(status) = self.api.tx_status(tx_id).await {
                if status.status == TxConfirmationStatus::Confirmed {
                    let final_balance = self.api.balance(child_address).await.unwrap_or(0.0);
                    let returned = (initial_child_balance - final_balance).max(0.0);
                    info!(address = %child_address, "sweep confirmed by tx_status poll");
                    return SweepResult {
                        child_address: child_address.to_string(),
                        returned_amount: returned,
                        final_child_balance: final_balance,
                        transaction_id: Some(tx_id.clone()),
                        verified: true,
                        error: None,
                    };
                }
            }
        }

        // 3. Direct balance delta on the child.
        let final_child_balance = self
            .api
            .balance(child_address)
            .await
            .unwrap_or(initial_child_balance);
        let child_delta = initial_child_balance - final_child_balance;
        if child_delta > BALANCE_DELTA_THRESHOLD {
            info!(address = %child_address, child_delta, "sweep confirmed by child balance delta");
            return SweepResult {
                child_address: child_address.to_string(),
                returned_amount: child_delta,
                final_child_balance,
                transaction_id: response.transaction_id,
                verified: true,
                error: None,
            };
        }

        // 4. Last resort: watch the parent's balance for the expected credit.
        let parent_target = parent_initial_balance + initial_child_balance;
        let outcome = verifier::watch_async(
            self.api,
            parent_address,
            parent_initial_balance,
            parent_target,
            self.parent_verify_max_wait,
            self.parent_verify_poll_interval,
        )
        .await;

        SweepResult {
            child_address: child_address.to_string(),
            returned_amount: if outcome.verified { outcome.delta } else { 0.0 },
            final_child_balance,
            transaction_id: response.transaction_id,
            verified: outcome.verified,
            error: if outcome.verified {
                None
            } else {
                Some("unable to verify sweep via any signal".to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_api::{
        FundPayload, FundResponse, Quote, ReturnAllFundsResponse, SwapResponse, TxStatusResponse,
    };
    use async_trait::async_trait;

    /// Reports a nonzero `amount_returned_sol`, so sweep confirms at step 1
    /// without needing the parent-watch fallback (which would otherwise
    /// block for real wall-clock time in a test).
    struct UpstreamConfirmsApi;

    #[async_trait]
    impl ExchangeApi for UpstreamConfirmsApi {
        async fn balance(&self, _address: &str) -> anyhow::Result<f64> {
            Ok(1.0)
        }
        async fn quote(
            &self,
            _in_mint: &str,
            _out_mint: &str,
            _amount_base_units: u64,
            _slippage_bps: u16,
            _only_direct: bool,
            _as_legacy: bool,
            _platform_fee_bps: u16,
        ) -> anyhow::Result<Quote> {
            unreachable!("sweep does not quote")
        }
        async fn swap(
            &self,
            _secret_bs58: &str,
            _quote: &Quote,
            _wrap_unwrap_sol: bool,
            _as_legacy: bool,
            _collect_fees: bool,
            _verify: bool,
        ) -> anyhow::Result<SwapResponse> {
            unreachable!("sweep does not swap")
        }
        async fn fund(&self, _payload: FundPayload) -> anyhow::Result<FundResponse> {
            unreachable!("sweep does not fund")
        }
        async fn return_all_funds(
            &self,
            _child_secret_bs58: &str,
            _parent_pubkey: &str,
        ) -> anyhow::Result<ReturnAllFundsResponse> {
            Ok(ReturnAllFundsResponse {
                status: UpstreamStatus::Success,
                transaction_id: Some("tx".to_string()),
                amount_returned_sol: 1.0,
                child_final_balance_sol: 0.0,
                error: None,
            })
        }
        async fn tx_status(&self, _tx_id: &str) -> anyhow::Result<TxStatusResponse> {
            Ok(TxStatusResponse {
                status: TxConfirmationStatus::Confirmed,
                confirmations: 1,
            })
        }
    }

    #[tokio::test]
    async fn sweep_confirms_via_upstream_amount() {
        let api = UpstreamConfirmsApi;
        let engine = SweepEngine::new(&api);
        let result = engine.sweep_child("parent", "child", "secret").await;
        assert!(result.verified);
        assert_eq!(result.returned_amount, 1.0);
    }

    /// An explicit `Success` status is trusted even when the upstream
    /// reports zero in `amount_returned_sol` (it doesn't always echo the
    /// amount back on every success path).
    #[tokio::test]
    async fn sweep_trusts_upstream_success_even_with_zero_reported_amount() {
        struct ZeroAmountSuccessApi;
        #[async_trait]
        impl ExchangeApi for ZeroAmountSuccessApi {
            async fn balance(&self, _address: &str) -> anyhow::Result<f64> {
                Ok(0.0)
            }
            async fn quote(
                &self,
                _in_mint: &str,
                _out_mint: &str,
                _amount_base_units: u64,
                _slippage_bps: u16,
                _only_direct: bool,
                _as_legacy: bool,
                _platform_fee_bps: u16,
            ) -> anyhow::Result<Quote> {
                unreachable!()
            }
            async fn swap(
                &self,
                _secret_bs58: &str,
                _quote: &Quote,
                _wrap_unwrap_sol: bool,
                _as_legacy: bool,
                _collect_fees: bool,
                _verify: bool,
            ) -> anyhow::Result<SwapResponse> {
                unreachable!()
            }
            async fn fund(&self, _payload: FundPayload) -> anyhow::Result<FundResponse> {
                unreachable!()
            }
            async fn return_all_funds(
                &self,
                _child_secret_bs58: &str,
                _parent_pubkey: &str,
            ) -> anyhow::Result<ReturnAllFundsResponse> {
                Ok(ReturnAllFundsResponse {
                    status: UpstreamStatus::Success,
                    transaction_id: Some("tx".to_string()),
                    amount_returned_sol: 0.0,
                    child_final_balance_sol: 0.0,
                    error: None,
                })
            }
            async fn tx_status(&self, _tx_id: &str) -> anyhow::Result<TxStatusResponse> {
                unreachable!("step 1 must short-circuit before a tx_status poll")
            }
        }

        let api = ZeroAmountSuccessApi;
        let engine = SweepEngine::new(&api);
        let result = engine.sweep_child("parent", "child", "secret").await;
        assert!(result.verified);
        assert_eq!(result.returned_amount, 0.0);
    }

    #[tokio::test]
    async fn sweep_preserves_rent_exempt_failure_verbatim() {
        struct RentExemptFailsApi;
        #[async_trait]
        impl ExchangeApi for RentExemptFailsApi {
            async fn balance(&self, _address: &str) -> anyhow::Result<f64> {
                Ok(0.002)
            }
            async fn quote(
                &self,
                _in_mint: &str,
                _out_mint: &str,
                _amount_base_units: u64,
                _slippage_bps: u16,
                _only_direct: bool,
                _as_legacy: bool,
                _platform_fee_bps: u16,
            ) -> anyhow::Result<Quote> {
                unreachable!()
            }
            async fn swap(
                &self,
                _secret_bs58: &str,
                _quote: &Quote,
                _wrap_unwrap_sol: bool,
                _as_legacy: bool,
                _collect_fees: bool,
                _verify: bool,
            ) -> anyhow::Result<SwapResponse> {
                unreachable!()
            }
            async fn fund(&self, _payload: FundPayload) -> anyhow::Result<FundResponse> {
                unreachable!()
            }
            async fn return_all_funds(
                &self,
                _child_secret_bs58: &str,
                _parent_pubkey: &str,
            ) -> anyhow::Result<ReturnAllFundsResponse> {
                Ok(ReturnAllFundsResponse {
                    status: UpstreamStatus::Failed,
                    transaction_id: None,
                    amount_returned_sol: 0.0,
                    child_final_balance_sol: 0.002,
                    error: Some("account would be below rent-exempt minimum".to_string()),
                })
            }
            async fn tx_status(&self, _tx_id: &str) -> anyhow::Result<TxStatusResponse> {
                unreachable!()
            }
        }

        let api = RentExemptFailsApi;
        let engine = SweepEngine::new(&api);
        let result = engine.sweep_child("parent", "child", "secret").await;
        assert!(!result.verified);
        assert_eq!(
            result.error.as_deref(),
            Some("account would be below rent-exempt minimum")
        );
    }
}
