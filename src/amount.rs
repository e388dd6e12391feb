//! Per-wallet swap amount computation under a chosen strategy (spec §4.B).

use crate::exchange_api::ExchangeApi;
use crate::wallet::Wallet;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Amount calculation strategy and its parameters (spec §3, `SwapConfig.amount_strategy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AmountStrategy {
    Fixed { amount: f64 },
    Percentage { percentage: f64 },
    Random { min: f64, max: f64 },
    Custom { amounts: Vec<f64> },
}

impl AmountStrategy {
    /// Validate the strategy-specific invariants from spec §3 `SwapConfig`.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AmountStrategy::Fixed { amount } => {
                if *amount > 0.0 {
                    Ok(())
                } else {
                    Err("fixed amount must be > 0".into())
                }
            }
            AmountStrategy::Percentage { percentage } => {
                if *percentage > 0.0 && *percentage <= 1.0 {
                    Ok(())
                } else {
                    Err("percentage must be in (0,1]".into())
                }
            }
            AmountStrategy::Random { min, max } => {
                if *min > 0.0 && *min < *max {
                    Ok(())
                } else {
                    Err("random strategy requires 0 < min < max".into())
                }
            }
            AmountStrategy::Custom { amounts } => {
                if !amounts.is_empty() && amounts.iter().all(|a| *a > 0.0) {
                    Ok(())
                } else {
                    Err("custom amounts must be non-empty and all > 0".into())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountPlan {
    pub wallet_index: usize,
    pub wallet_address: String,
    pub calculated_amount: f64,
    pub strategy_used: String,
    pub source_balance: Option<f64>,
    pub percentage_used: Option<f64>,
    pub error: Option<String>,
}

impl AmountPlan {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.calculated_amount > 0.0
    }
}

/// Strategy for [`adjust_to_budget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAdjustStrategy {
    Proportional,
    EqualReduction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub total: f64,
    pub zero_amount_count: usize,
}

/// Computes per-wallet swap amounts; the sole collaborator to the upstream
/// balance check needed by the Percentage strategy.
pub struct AmountCalculator<'a> {
    api: &'a dyn ExchangeApi,
}

impl<'a> AmountCalculator<'a> {
    pub fn new(api: &'a dyn ExchangeApi) -> Self {
        Self { api }
    }

    pub async fn calculate(
        &self,
        wallets: &[Wallet],
        strategy: &AmountStrategy,
        token_mint: &str,
        min_balance_threshold: f64,
    ) -> Vec<AmountPlan> {
        match strategy {
            AmountStrategy::Fixed { amount } => wallets
                .iter()
                .enumerate()
                .map(|(i, w)| AmountPlan {
                    wallet_index: i,
                    wallet_address: w.address.clone(),
                    calculated_amount: *amount,
                    strategy_used: "fixed".to_string(),
                    source_balance: None,
                    percentage_used: None,
                    error: None,
                })
                .collect(),
            AmountStrategy::Percentage { percentage } => {
                self.calculate_percentage(wallets, *percentage, token_mint, min_balance_threshold)
                    .await
            }
            AmountStrategy::Random { min, max } => {
                let mut rng = rand::thread_rng();
                wallets
                    .iter()
                    .enumerate()
                    .map(|(i, w)| AmountPlan {
                        wallet_index: i,
                        wallet_address: w.address.clone(),
                        calculated_amount: rng.gen_range(*min..=*max),
                        strategy_used: "random".to_string(),
                        source_balance: None,
                        percentage_used: None,
                        error: None,
                    })
                    .collect()
            }
            AmountStrategy::Custom { amounts } => wallets
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let amount = match amounts.get(i) {
                        Some(a) => *a,
                        None => {
                            tracing::warn!(
                                wallet_index = i,
                                total_amounts = amounts.len(),
                                "fewer custom amounts than wallets, reusing last amount"
                            );
                            *amounts.last().expect("validated non-empty")
                        }
                    };
                    AmountPlan {
                        wallet_index: i,
                        wallet_address: w.address.clone(),
                        calculated_amount: amount,
                        strategy_used: "custom".to_string(),
                        source_balance: None,
                        percentage_used: None,
                        error: None,
                    }
                })
                .collect(),
        }
    }

    async fn calculate_percentage(
        &self,
        wallets: &[Wallet],
        percentage: f64,
        token_mint: &str,
        min_balance_threshold: f64,
    ) -> Vec<AmountPlan> {
        let mut results = Vec::with_capacity(wallets.len());
        for (i, w) in wallets.iter().enumerate() {
            let plan = match self.api.balance(&w.address).await {
                Ok(balance) => {
                    let _ = token_mint; // balance check is against the configured mint
                    if balance <= min_balance_threshold {
                        AmountPlan {
                            wallet_index: i,
                            wallet_address: w.address.clone(),
                            calculated_amount: 0.0,
                            strategy_used: "percentage".to_string(),
                            source_balance: Some(balance),
                            percentage_used: None,
                            error: Some(format!("insufficient balance: {balance:.6}")),
                        }
                    } else {
                        let available = balance - min_balance_threshold;
                        let amount = (available * percentage).min(available);
                        AmountPlan {
                            wallet_index: i,
                            wallet_address: w.address.clone(),
                            calculated_amount: amount,
                            strategy_used: "percentage".to_string(),
                            source_balance: Some(balance),
                            percentage_used: Some(percentage),
                            error: None,
                        }
                    }
                }
                Err(e) => AmountPlan {
                    wallet_index: i,
                    wallet_address: w.address.clone(),
                    calculated_amount: 0.0,
                    strategy_used: "percentage".to_string(),
                    source_balance: None,
                    percentage_used: None,
                    error: Some(format!("balance check failed: {e}")),
                },
            };
            results.push(plan);
        }
        results
    }

    /// Validate a plan against an optional total budget and per-wallet limit.
    pub fn validate(
        plan: &[AmountPlan],
        total_budget: Option<f64>,
        per_wallet_limit: Option<f64>,
    ) -> ValidationReport {
        let mut issues = Vec::new();
        let valid_entries: Vec<&AmountPlan> = plan.iter().filter(|p| p.is_valid()).collect();
        let total: f64 = valid_entries.iter().map(|p| p.calculated_amount).sum();
        let zero_amount_count = plan.iter().filter(|p| p.calculated_amount <= 0.0).count();

        if let Some(budget) = total_budget {
            if total > budget {
                issues.push(format!(
                    "total amount {total:.6} exceeds budget {budget:.6}"
                ));
            }
        }
        if let Some(limit) = per_wallet_limit {
            for p in &valid_entries {
                if p.calculated_amount > limit {
                    issues.push(format!(
                        "wallet {} amount {:.6} exceeds per-wallet limit {limit:.6}",
                        p.wallet_index, p.calculated_amount
                    ));
                }
            }
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
            total,
            zero_amount_count,
        }
    }

    /// Scale or subtract plan amounts to fit `budget`. Invalid entries are
    /// retained unchanged; ordering is preserved.
    pub fn adjust_to_budget(
        plan: &[AmountPlan],
        budget: f64,
        strategy: BudgetAdjustStrategy,
    ) -> Vec<AmountPlan> {
        let total: f64 = plan
            .iter()
            .filter(|p| p.is_valid())
            .map(|p| p.calculated_amount)
            .sum();

        if total <= budget || total == 0.0 {
            return plan.to_vec();
        }

        match strategy {
            BudgetAdjustStrategy::Proportional => {
                let factor = budget / total;
                plan.iter()
                    .map(|p| {
                        if p.is_valid() {
                            let mut adjusted = p.clone();
                            adjusted.calculated_amount *= factor;
                            adjusted
                        } else {
                            p.clone()
                        }
                    })
                    .collect()
            }
            BudgetAdjustStrategy::EqualReduction => {
                let valid_count = plan.iter().filter(|p| p.is_valid()).count() as f64;
                if valid_count == 0.0 {
                    return plan.to_vec();
                }
                let excess = total - budget;
                let per_wallet_cut = excess / valid_count;
                plan.iter()
                    .map(|p| {
                        if p.is_valid() {
                            let mut adjusted = p.clone();
                            adjusted.calculated_amount =
                                (adjusted.calculated_amount - per_wallet_cut).max(0.0);
                            adjusted
                        } else {
                            p.clone()
                        }
                    })
                    .collect()
            }
        }
    }
}
