//! Order-related types and identifiers.
//!
//! The exit engine only ever sells, but the side enum is kept two-valued so
//! the submission collaborator can share types with entry strategies.

use crate::{Cents, InstrumentKey, Shares};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Client order ID for idempotency.
///
/// Every order must have a unique cloid to prevent duplicate
/// submissions on retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `scalp_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("scalp_{ts}_{uuid_short}"))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sell order produced by the exit engine for one liquidation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOrder {
    /// Client order ID.
    pub cloid: ClientOrderId,
    /// Instrument to sell.
    pub instrument: InstrumentKey,
    /// Always `Sell` for exits; carried explicitly for the submitter.
    pub side: OrderSide,
    /// Shares to sell.
    pub shares: Shares,
    /// Limit price in cents.
    pub limit_price: Cents,
    /// Notional in USD (shares × price / 100), precomputed for sizing checks.
    pub notional_usd: Decimal,
    /// Timestamp when the order was created (Unix milliseconds).
    pub created_at_ms: u64,
}

impl ExitOrder {
    pub fn new(
        instrument: InstrumentKey,
        shares: Shares,
        limit_price: Cents,
        created_at_ms: u64,
    ) -> Self {
        let notional_usd = shares.notional_usd(limit_price);
        Self {
            cloid: ClientOrderId::new(),
            instrument,
            side: OrderSide::Sell,
            shares,
            limit_price,
            notional_usd,
            created_at_ms,
        }
    }
}

/// Status of one submission attempt, as reported by the submission
/// collaborator.
///
/// Anything other than `Submitted` is treated as "not filled this attempt";
/// the engine never retries inside the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// Order accepted by the exchange.
    Submitted,
    /// Submission failed (network, rejection, balance).
    Failed,
    /// Collaborator declined to submit (pre-trade check).
    Skipped,
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one submission attempt.
///
/// The `reason` is inspected only for diagnostic classification (e.g.
/// distinguishing a minimum-size rejection from a generic failure); it never
/// feeds decision logic beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub status: SubmitStatus,
    pub reason: Option<String>,
}

impl SubmitOutcome {
    pub fn submitted() -> Self {
        Self {
            status: SubmitStatus::Submitted,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.status == SubmitStatus::Submitted
    }

    /// Diagnostic classification: did the collaborator report a
    /// minimum-order-size rejection?
    pub fn is_min_size_rejection(&self) -> bool {
        self.reason
            .as_deref()
            .map(|r| {
                let r = r.to_ascii_lowercase();
                r.contains("min") && (r.contains("size") || r.contains("order"))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cloid_format() {
        let cloid = ClientOrderId::new();
        assert!(cloid.as_str().starts_with("scalp_"));
    }

    #[test]
    fn test_cloid_uniqueness() {
        let a = ClientOrderId::new();
        let b = ClientOrderId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_exit_order_notional() {
        let order = ExitOrder::new(
            InstrumentKey::new("0xabc", "1"),
            Shares::new(dec!(3)),
            Cents::new(dec!(40)),
            1_000,
        );
        assert_eq!(order.notional_usd, dec!(1.20));
        assert_eq!(order.side, OrderSide::Sell);
    }

    #[test]
    fn test_min_size_rejection_classification() {
        assert!(SubmitOutcome::skipped("below minimum order size").is_min_size_rejection());
        assert!(SubmitOutcome::failed("min size $5 not met").is_min_size_rejection());
        assert!(!SubmitOutcome::failed("insufficient balance").is_min_size_rejection());
        assert!(!SubmitOutcome::submitted().is_min_size_rejection());
    }
}
