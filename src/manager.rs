//! Multi-wallet orchestrator: selection, amount pipeline, execution mode
//! dispatch (spec §4.G).

use crate::amount::{AmountCalculator, AmountPlan};
use crate::config::{ExecutionMode, SelectionPolicy, SwapConfig};
use crate::exchange_api::ExchangeApi;
use crate::executor::{ExecuteParams, SwapExecutor};
use crate::quote_cache::QuoteCache;
use crate::types::{BatchResult, ExecutionSummary, SwapResult, SwapStatus};
use crate::wallet::{Wallet, WalletSet};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Single cancellation flag observed at every task boundary (spec §5).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Select child wallets by the configured policy (spec §4.G.1).
pub fn select_wallets(children: &[Wallet], policy: &SelectionPolicy) -> Vec<Wallet> {
    match policy {
        SelectionPolicy::All => children.to_vec(),
        SelectionPolicy::FirstN(n) => children.iter().take(*n).cloned().collect(),
        SelectionPolicy::Random(n) => {
            let mut rng = rand::thread_rng();
            let mut indices: Vec<usize> = (0..children.len()).collect();
            indices.shuffle(&mut rng);
            indices
                .into_iter()
                .take((*n).min(children.len()))
                .map(|i| children[i].clone())
                .collect()
        }
        SelectionPolicy::Custom(indices) => indices
            .iter()
            .filter_map(|&i| children.get(i).cloned())
            .collect(),
    }
}

fn skipped_result(wallet: &Wallet, config: &SwapConfig, reason: &str) -> SwapResult {
    let now = Utc::now();
    SwapResult {
        wallet_index: wallet.index,
        wallet_address: wallet.address.clone(),
        input_token: config.input_token.clone(),
        output_token: config.output_token.clone(),
        input_amount: 0.0,
        attempts: Vec::new(),
        status: SwapStatus::Skipped,
        transaction_id: None,
        actual_input: None,
        actual_output: None,
        price_impact: None,
        fee_collected: None,
        started_at: now,
        ended_at: Some(now),
        final_error: Some(reason.to_string()),
        error_class: None,
    }
}

pub struct WalletSwapManager<'a> {
    api: &'a dyn ExchangeApi,
    quote_cache: QuoteCache,
}

impl<'a> WalletSwapManager<'a> {
    pub fn new(api: &'a dyn ExchangeApi) -> Self {
        Self {
            api,
            quote_cache: QuoteCache::new(),
        }
    }

    /// Run a full swap campaign against `wallets` under `config`.
    pub async fn run(
        &self,
        config: &SwapConfig,
        wallets: &WalletSet,
        cancellation: CancellationToken,
    ) -> anyhow::Result<ExecutionSummary> {
        let start = Instant::now();

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;

        let selected = select_wallets(&wallets.children, &config.selection_policy);
        info!(count = selected.len(), "selected wallets for swap run");

        let calculator = AmountCalculator::new(self.api);
        let input_mint = crate::config::resolve_mint(&config.input_token);
        let plans = calculator
            .calculate(
                &selected,
                &config.amount_strategy,
                &input_mint,
                config.min_balance_threshold,
            )
            .await;

        let amount_calculations = plans.clone();

        let valid_plans: Vec<(Wallet, AmountPlan)> = selected
            .into_iter()
            .zip(plans)
            .filter(|(_, plan)| plan.is_valid())
            .collect();

        if valid_plans.is_empty() {
            anyhow::bail!("no valid amount plans remain after filtering");
        }

        if config.dry_run {
            info!("dry_run set, skipping execution");
            let results: Vec<SwapResult> = valid_plans
                .iter()
                .map(|(w, _)| skipped_result(w, config, "dry_run"))
                .collect();
            return Ok(ExecutionSummary::from_results(
                results,
                Vec::new(),
                amount_calculations,
                start.elapsed(),
            ));
        }

        let (results, batch_results) = match &config.execution_mode {
            ExecutionMode::Sequential => (
                self.run_sequential(config, &valid_plans, &cancellation).await,
                Vec::new(),
            ),
            ExecutionMode::Parallel { max_concurrent } => (
                self.run_parallel(config, &valid_plans, *max_concurrent, &cancellation)
                    .await,
                Vec::new(),
            ),
            ExecutionMode::Batch { batch_size } => {
                self.run_batched(config, &valid_plans, *batch_size, &cancellation)
                    .await
            }
        };

        Ok(ExecutionSummary::from_results(
            results,
            batch_results,
            amount_calculations,
            start.elapsed(),
        ))
    }

    async fn run_sequential(
        &self,
        config: &SwapConfig,
        plans: &[(Wallet, AmountPlan)],
        cancellation: &CancellationToken,
    ) -> Vec<SwapResult> {
        let mut results = Vec::with_capacity(plans.len());
        let executor = SwapExecutor::new(self.api, &self.quote_cache);

        for (i, (wallet, plan)) in plans.iter().enumerate() {
            if cancellation.is_cancelled() {
                results.push(skipped_result(wallet, config, "cancelled"));
                continue;
            }

            let result = executor
                .execute(self.execute_params(config, wallet, plan))
                .await;
            results.push(result);

            if i + 1 < plans.len() {
                tokio::time::sleep(Duration::from_secs_f64(config.delay_between_swaps_secs)).await;
            }
        }
        results
    }

    async fn run_parallel(
        &self,
        config: &SwapConfig,
        plans: &[(Wallet, AmountPlan)],
        max_concurrent: usize,
        cancellation: &CancellationToken,
    ) -> Vec<SwapResult> {
        // Fan out on the same scheduler (no OS threads): a bounded stream of
        // cooperative futures, each checking cancellation at its own task
        // boundary. `buffer_unordered` caps in-flight futures at
        // `max_concurrent`, matching spec §5's counting-semaphore bound
        // without spawning work onto other threads.
        let executor = SwapExecutor::new(self.api, &self.quote_cache);
        let futures = plans.iter().map(|(wallet, plan)| {
            let cancellation = cancellation.clone();
            async move {
                if cancellation.is_cancelled() {
                    return skipped_result(wallet, config, "cancelled");
                }
                executor
                    .execute(Self::execute_params_static(config, wallet, plan))
                    .await
            }
        });

        stream::iter(futures)
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }

    async fn run_batched(
        &self,
        config: &SwapConfig,
        plans: &[(Wallet, AmountPlan)],
        batch_size: usize,
        cancellation: &CancellationToken,
    ) -> (Vec<SwapResult>, Vec<BatchResult>) {
        let mut all_results = Vec::with_capacity(plans.len());
        let mut batch_results = Vec::new();
        let batch_size = batch_size.max(1);

        for (batch_index, chunk) in plans.chunks(batch_size).enumerate() {
            let batch_started = Utc::now();
            let results = self.run_sequential(config, chunk, cancellation).await;
            all_results.extend(results.clone());
            batch_results.push(BatchResult {
                batch_index,
                results,
                started_at: batch_started,
                ended_at: Utc::now(),
            });

            if (batch_index + 1) * batch_size < plans.len() {
                tokio::time::sleep(Duration::from_secs_f64(config.delay_between_batches_secs))
                    .await;
            }
        }

        (all_results, batch_results)
    }

    fn execute_params<'p>(
        &self,
        config: &'p SwapConfig,
        wallet: &'p Wallet,
        plan: &'p AmountPlan,
    ) -> ExecuteParams<'p> {
        Self::execute_params_static(config, wallet, plan)
    }

    fn execute_params_static<'p>(
        config: &'p SwapConfig,
        wallet: &'p Wallet,
        plan: &'p AmountPlan,
    ) -> ExecuteParams<'p> {
        ExecuteParams {
            wallet_address: &wallet.address,
            wallet_secret_bs58: wallet.secret_key_bs58.as_deref().unwrap_or_default(),
            wallet_index: wallet.index,
            input_token: &config.input_token,
            output_token: &config.output_token,
            amount: plan.calculated_amount,
            slippage_bps: config.slippage_bps,
            collect_fees: config.collect_fees,
            verify: config.verify,
            max_retries: config.max_retries,
        }
    }
}
