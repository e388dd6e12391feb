//! Error classification for upstream (`ExchangeApi`) failures.
//!
//! The exchange API returns free-form error text. We classify it once, at
//! this boundary, into a category that downstream code (retry policy,
//! reporting, propagation rules) can dispatch on without re-parsing strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to an upstream error, driving retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Balance,
    Auth,
    RateLimit,
    Chain,
    Slippage,
    Quote,
    Unknown,
}

/// Severity associated with a category, independent of retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Temporary,
    Skippable,
    Critical,
    Unknown,
}

impl ErrorCategory {
    /// Severity for this category, per the classification table.
    pub fn severity(self) -> Severity {
        match self {
            ErrorCategory::Network
            | ErrorCategory::RateLimit
            | ErrorCategory::Chain
            | ErrorCategory::Slippage
            | ErrorCategory::Quote => Severity::Temporary,
            ErrorCategory::Balance => Severity::Skippable,
            ErrorCategory::Auth => Severity::Critical,
            ErrorCategory::Unknown => Severity::Unknown,
        }
    }

    /// Whether errors of this category should ever be retried.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorCategory::Balance | ErrorCategory::Auth)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Balance => "balance",
            ErrorCategory::Auth => "auth",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Chain => "chain",
            ErrorCategory::Slippage => "slippage",
            ErrorCategory::Quote => "quote",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classified upstream error: the category plus the original message
/// preserved verbatim (some substrings, e.g. "insufficient funds for rent",
/// carry domain-specific remediation and must never be reformatted).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let category = classify(&message);
        Self { category, message }
    }
}

/// Substrings checked in table order; first match wins. Case-insensitive.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &["timeout", "connection", "network", "unreachable"],
    ),
    (
        ErrorCategory::Balance,
        &["insufficient", "balance", "funds", "lamports"],
    ),
    (
        ErrorCategory::Auth,
        &["private key", "signature", "unauthorized", "invalid key"],
    ),
    (
        ErrorCategory::RateLimit,
        &["rate limit", "too many requests", "throttle"],
    ),
    (
        ErrorCategory::Chain,
        &["transaction", "gas", "fee", "simulation", "blockhash"],
    ),
    (ErrorCategory::Slippage, &["slippage", "price"]),
    (ErrorCategory::Quote, &["quote"]),
];

/// Classify an error message by case-insensitive substring match.
pub fn classify(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    for (category, needles) in RULES {
        if needles.iter().any(|n| lower.contains(n)) {
            return *category;
        }
    }
    ErrorCategory::Unknown
}
