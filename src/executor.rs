//! Single-wallet swap execution with retries, verification hooks, and
//! result capture (spec §4.F).

use crate::error::classify;
use crate::exchange_api::ExchangeApi;
use crate::quote_cache::QuoteCache;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::types::{SwapAttempt, SwapResult, SwapStatus};
use chrono::Utc;
use tracing::{info, warn};

const MIN_AMOUNT: f64 = 1e-6;

/// Per-swap execution parameters the Manager hands to the Executor.
pub struct ExecuteParams<'a> {
    pub wallet_address: &'a str,
    pub wallet_secret_bs58: &'a str,
    pub wallet_index: usize,
    pub input_token: &'a str,
    pub output_token: &'a str,
    pub amount: f64,
    pub slippage_bps: u16,
    pub collect_fees: bool,
    pub verify: bool,
    pub max_retries: u32,
}

#[derive(Clone, Copy)]
pub struct SwapExecutor<'a> {
    api: &'a dyn ExchangeApi,
    quote_cache: &'a QuoteCache,
}

impl<'a> SwapExecutor<'a> {
    pub fn new(api: &'a dyn ExchangeApi, quote_cache: &'a QuoteCache) -> Self {
        Self { api, quote_cache }
    }

    pub async fn execute(&self, params: ExecuteParams<'_>) -> SwapResult {
        let started_at = Utc::now();

        if !(params.amount > MIN_AMOUNT) {
            warn!(
                wallet_index = params.wallet_index,
                amount = params.amount,
                "swap validation failed, skipping"
            );
            return SwapResult {
                wallet_index: params.wallet_index,
                wallet_address: params.wallet_address.to_string(),
                input_token: params.input_token.to_string(),
                output_token: params.output_token.to_string(),
                input_amount: params.amount,
                attempts: Vec::new(),
                status: SwapStatus::Skipped,
                transaction_id: None,
                actual_input: None,
                actual_output: None,
                price_impact: None,
                fee_collected: None,
                started_at,
                ended_at: Some(Utc::now()),
                final_error: Some(format!("invalid amount: {}", params.amount)),
                error_class: None,
            };
        }

        let max_attempts = params.max_retries + 1;
        let mut attempts = Vec::new();
        let mut final_status = SwapStatus::Failed;
        let mut final_error = None;
        let mut error_class = None;
        let mut transaction_id = None;
        let mut actual_input = None;
        let mut actual_output = None;
        let mut price_impact = None;
        let mut fee_collected = None;

        for attempt_number in 0..max_attempts {
            #[cfg(feature = "metrics")]
            crate::metrics::record_swap_attempt();

            let attempt_started = Utc::now();
            let mut attempt = SwapAttempt {
                attempt_number,
                started_at: attempt_started,
                ended_at: None,
                status: SwapStatus::QuoteRequested,
                error: None,
                transaction_id: None,
                quote: None,
            };

            match self.run_attempt(&params, &mut attempt).await {
                Ok(outcome) => {
                    attempt.status = SwapStatus::Success;
                    attempt.ended_at = Some(Utc::now());
                    transaction_id = outcome.transaction_id;
                    actual_input = outcome.actual_input;
                    actual_output = outcome.actual_output;
                    price_impact = outcome.price_impact;
                    fee_collected = outcome.fee_collected;
                    attempt.transaction_id = transaction_id.clone();
                    attempts.push(attempt);
                    final_status = SwapStatus::Success;
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_swap_success();
                    info!(
                        wallet_index = params.wallet_index,
                        attempt = attempt_number,
                        "swap succeeded"
                    );
                    break;
                }
                Err(message) => {
                    attempt.status = SwapStatus::Failed;
                    attempt.error = Some(message.clone());
                    attempt.ended_at = Some(Utc::now());
                    attempts.push(attempt);

                    let category = classify(&message);
                    warn!(
                        wallet_index = params.wallet_index,
                        attempt = attempt_number,
                        error = %message,
                        category = %category,
                        "swap attempt failed"
                    );

                    match RetryPolicy::decide(category, attempt_number) {
                        RetryDecision::Retry { delay } => {
                            #[cfg(feature = "metrics")]
                            crate::metrics::record_swap_retry();
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        RetryDecision::Stop => {
                            final_status = SwapStatus::Failed;
                            final_error = Some(message);
                            error_class = Some(category);
                            break;
                        }
                    }
                }
            }
        }

        if final_status != SwapStatus::Success && final_error.is_none() {
            // Exhausted max_attempts without an explicit Stop decision, e.g.
            // a retryable category whose attempt cap was reached.
            if let Some(last) = attempts.last() {
                let message = last.error.clone().unwrap_or_default();
                error_class = Some(classify(&message));
                final_error = Some(message);
            }
        }

        if final_status != SwapStatus::Success {
            tracing::error!(
                wallet_index = params.wallet_index,
                attempts = attempts.len(),
                error = ?final_error,
                "swap failed after all attempts"
            );
        }

        SwapResult {
            wallet_index: params.wallet_index,
            wallet_address: params.wallet_address.to_string(),
            input_token: params.input_token.to_string(),
            output_token: params.output_token.to_string(),
            input_amount: params.amount,
            attempts,
            status: final_status,
            transaction_id,
            actual_input,
            actual_output,
            price_impact,
            fee_collected,
            started_at,
            ended_at: Some(Utc::now()),
            final_error,
            error_class,
        }
    }

    async fn run_attempt(
        &self,
        params: &ExecuteParams<'_>,
        attempt: &mut SwapAttempt,
    ) -> Result<AttemptOutcome, String> {
        let amount_base_units = (params.amount * 1_000_000_000.0) as u64;

        let quote = match self
            .quote_cache
            .get(params.input_token, params.output_token, amount_base_units)
            .await
        {
            Some(cached) => cached,
            None => {
                let fetched = self
                    .api
                    .quote(
                        params.input_token,
                        params.output_token,
                        amount_base_units,
                        params.slippage_bps,
                        false,
                        false,
                        0,
                    )
                    .await
                    .map_err(|_| "Failed to get valid quote".to_string())?;
                self.quote_cache
                    .insert(
                        params.input_token,
                        params.output_token,
                        amount_base_units,
                        fetched.clone(),
                    )
                    .await;
                fetched
            }
        };
        attempt.status = SwapStatus::QuoteReceived;
        attempt.quote = Some(quote.clone());

        attempt.status = SwapStatus::Executing;
        let response = self
            .api
            .swap(
                params.wallet_secret_bs58,
                &quote,
                true,
                false,
                params.collect_fees,
                params.verify,
            )
            .await
            .map_err(|e| e.to_string())?;

        if response.status != crate::exchange_api::UpstreamStatus::Success {
            return Err(response
                .error
                .unwrap_or_else(|| "swap failed with non-success status".to_string()));
        }

        Ok(AttemptOutcome {
            transaction_id: response.transaction_id,
            actual_input: response.actual_input,
            actual_output: response.actual_output,
            price_impact: Some(quote.price_impact_pct),
            fee_collected: response.fee_collection.map(|f| f as f64),
        })
    }
}

struct AttemptOutcome {
    transaction_id: Option<String>,
    actual_input: Option<f64>,
    actual_output: Option<f64>,
    price_impact: Option<f64>,
    fee_collected: Option<f64>,
}
