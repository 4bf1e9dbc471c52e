//! Instrument identification.
//!
//! A prediction market resolves one condition with several outcome tokens;
//! each tradable outcome token is an instrument. Both identifiers are opaque
//! strings assigned by the exchange (condition id is hex, token id is a long
//! decimal string), so the key is string-based rather than numeric.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an outcome token within a market.
///
/// This is the primary key for all per-instrument engine state
/// (plans, breaker entries, cooldowns, price history).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    /// Market condition id.
    pub market: String,
    /// Outcome token id.
    pub token: String,
}

impl InstrumentKey {
    pub fn new(market: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            token: token.into(),
        }
    }

    /// Returns the canonical string representation.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.market, self.token)
    }

    /// Short form for log lines: truncated ids.
    pub fn short(&self) -> String {
        let m: String = self.market.chars().take(8).collect();
        let t: String = self.token.chars().take(8).collect();
        format!("{m}…:{t}…")
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.token)
    }
}
