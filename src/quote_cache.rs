//! Memoise recent DEX quotes keyed by `(in, out, amount)` (spec §4.E).
//!
//! Backed by `moka`'s async cache (already a teacher dependency, used there
//! for pool caching) rather than a hand-rolled map + manual TTL sweep.

use crate::exchange_api::Quote;
use moka::future::Cache;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
    in_mint: String,
    out_mint: String,
    amount_base_units: u64,
}

/// Single-run, never-persisted quote cache.
#[derive(Clone)]
pub struct QuoteCache {
    inner: Cache<QuoteKey, Quote>,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().time_to_live(TTL).build(),
        }
    }

    pub async fn get(&self, in_mint: &str, out_mint: &str, amount_base_units: u64) -> Option<Quote> {
        let key = QuoteKey {
            in_mint: in_mint.to_string(),
            out_mint: out_mint.to_string(),
            amount_base_units,
        };
        self.inner.get(&key).await
    }

    pub async fn insert(&self, in_mint: &str, out_mint: &str, amount_base_units: u64, quote: Quote) {
        let key = QuoteKey {
            in_mint: in_mint.to_string(),
            out_mint: out_mint.to_string(),
            amount_base_units,
        };
        self.inner.insert(key, quote).await;
    }
}
