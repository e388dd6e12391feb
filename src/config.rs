//! Configuration surface (spec §6.3): `SwapConfig` and its nested strategy
//! configs, loaded from environment variables / `.env`, following the
//! teacher's `get_*_env` helper style.

use crate::amount::AmountStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionMode {
    Sequential,
    Parallel { max_concurrent: usize },
    Batch { batch_size: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectionPolicy {
    All,
    FirstN(usize),
    Random(usize),
    Custom(Vec<usize>),
}

/// Immutable once execution starts (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    pub operation: Operation,
    pub input_token: String,
    pub output_token: String,
    pub amount_strategy: AmountStrategy,
    pub execution_mode: ExecutionMode,
    pub selection_policy: SelectionPolicy,
    pub slippage_bps: u16,
    pub verify: bool,
    pub collect_fees: bool,
    pub dry_run: bool,
    pub max_retries: u32,
    pub delay_between_swaps_secs: f64,
    pub delay_between_batches_secs: f64,
    pub min_balance_threshold: f64,
}

impl SwapConfig {
    /// Validate invariants from spec §3.
    pub fn validate(&self) -> Result<(), String> {
        if self.input_token == self.output_token {
            return Err("input_token must differ from output_token".to_string());
        }
        if self.slippage_bps > 5000 {
            return Err("slippage_bps must be in [0, 5000]".to_string());
        }
        self.amount_strategy.validate()
    }
}

/// Resolves well-known symbols to mint addresses (spec §6.3).
pub fn resolve_mint(symbol_or_mint: &str) -> String {
    match symbol_or_mint {
        "SOL" => "So11111111111111111111111111111111111111112".to_string(),
        "USDC" => "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
        "USDT" => "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
        "BONK" => "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263".to_string(),
        other => other.to_string(),
    }
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_bool_env(key: &str, default: bool) -> bool {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}

fn get_u64_env(key: &str, default: u64) -> Result<u64> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {key} as u64"))?)
}

fn get_u32_env(key: &str, default: u32) -> Result<u32> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {key} as u32"))?)
}

fn get_f64_env(key: &str, default: f64) -> Result<f64> {
    Ok(std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .context(format!("Failed to parse {key} as f64"))?)
}

impl SwapConfig {
    /// Load a default `SwapConfig` from environment variables / `.env`,
    /// mirroring the teacher's `Config::load` style.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let operation = match get_env_or_default("OPERATION", "buy").as_str() {
            "sell" => Operation::Sell,
            _ => Operation::Buy,
        };

        let strategy_name = get_env_or_default("AMOUNT_STRATEGY", "fixed");
        let amount_strategy = match strategy_name.as_str() {
            "percentage" => AmountStrategy::Percentage {
                percentage: get_f64_env("AMOUNT_PERCENTAGE", 0.5)?,
            },
            "random" => AmountStrategy::Random {
                min: get_f64_env("AMOUNT_MIN", 0.01)?,
                max: get_f64_env("AMOUNT_MAX", 0.1)?,
            },
            "custom" => AmountStrategy::Custom {
                amounts: get_env_or_default("AMOUNT_CUSTOM_LIST", "0.01")
                    .split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect(),
            },
            _ => AmountStrategy::Fixed {
                amount: get_f64_env("AMOUNT_FIXED", 0.01)?,
            },
        };

        let execution_mode = match get_env_or_default("EXECUTION_MODE", "sequential").as_str() {
            "parallel" => ExecutionMode::Parallel {
                max_concurrent: get_u64_env("MAX_CONCURRENT", 4)? as usize,
            },
            "batch" => ExecutionMode::Batch {
                batch_size: get_u64_env("BATCH_SIZE", 5)? as usize,
            },
            _ => ExecutionMode::Sequential,
        };

        let selection_policy = match get_env_or_default("WALLET_SELECTION", "all").as_str() {
            "first_n" => SelectionPolicy::FirstN(get_u64_env("WALLET_COUNT", 1)? as usize),
            "random" => SelectionPolicy::Random(get_u64_env("WALLET_COUNT", 1)? as usize),
            "custom" => SelectionPolicy::Custom(
                get_env_or_default("CUSTOM_WALLET_INDICES", "")
                    .split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect(),
            ),
            _ => SelectionPolicy::All,
        };

        Ok(SwapConfig {
            operation,
            input_token: get_env_or_default("INPUT_TOKEN", "SOL"),
            output_token: get_env_or_default("OUTPUT_TOKEN", "USDC"),
            amount_strategy,
            execution_mode,
            selection_policy,
            slippage_bps: get_u32_env("SLIPPAGE_BPS", 50)? as u16,
            verify: get_bool_env("VERIFY", true),
            collect_fees: get_bool_env("COLLECT_FEES", false),
            dry_run: get_bool_env("DRY_RUN", false),
            max_retries: get_u32_env("MAX_RETRIES", 3)?,
            delay_between_swaps_secs: get_f64_env("DELAY_BETWEEN_SWAPS_SECS", 0.5)?,
            delay_between_batches_secs: get_f64_env("DELAY_BETWEEN_BATCHES_SECS", 2.0)?,
            min_balance_threshold: get_f64_env("BALANCE_CHECK_THRESHOLD", 0.001)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn resolves_well_known_symbols() {
        assert_eq!(
            resolve_mint("SOL"),
            "So11111111111111111111111111111111111111112"
        );
    }

    #[test]
    fn passes_through_long_mints() {
        let mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        assert_eq!(resolve_mint(mint), mint);
    }

    #[test]
    fn validate_rejects_identical_tokens() {
        let cfg = SwapConfig {
            operation: Operation::Buy,
            input_token: "SOL".into(),
            output_token: "SOL".into(),
            amount_strategy: AmountStrategy::Fixed { amount: 0.1 },
            execution_mode: ExecutionMode::Sequential,
            selection_policy: SelectionPolicy::All,
            slippage_bps: 50,
            verify: true,
            collect_fees: false,
            dry_run: false,
            max_retries: 3,
            delay_between_swaps_secs: 0.0,
            delay_between_batches_secs: 0.0,
            min_balance_threshold: 0.0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    #[serial]
    fn load_uses_defaults_when_unset() {
        std::env::remove_var("OPERATION");
        std::env::remove_var("SLIPPAGE_BPS");
        let cfg = SwapConfig::load().unwrap();
        assert_eq!(cfg.slippage_bps, 50);
    }
}
