// Wallet Swap Orchestrator
//
// Coordinates multi-wallet DEX swaps against an opaque upstream exchange
// API: per-wallet amount planning, retrying swap execution, parent->child
// funding, child->parent sweeping, and run reporting.

pub mod amount;
pub mod config;
pub mod error;
pub mod exchange_api;
pub mod executor;
pub mod funding;
pub mod key_codec;
#[cfg(test)]
pub mod mock;
pub mod manager;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod quote_cache;
pub mod reporting;
pub mod retry;
pub mod sweep;
pub mod types;
pub mod verifier;
pub mod wallet;
