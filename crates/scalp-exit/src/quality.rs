//! Order-book quality validation.
//!
//! Pure classifier of book health, checked before every liquidation
//! attempt and before plan creation. The verdicts are ordered: an absent
//! executable price outranks structural corruption, which outranks a
//! merely suspicious price. Each non-VALID verdict demands a different
//! remedy, so they are distinct variants rather than one error string.

use scalp_core::Cents;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::QualityConfig;

/// Verdict on the health of one instrument's top of book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityVerdict {
    /// Book is usable for an exit attempt.
    Valid,
    /// Bid absent or zero; nothing to execute against.
    NoExecutionPrice,
    /// Structurally impossible book: crossed, or bid pinned at the floor
    /// while the ask sits at the ceiling (wrong-instrument data or cache
    /// corruption).
    InvalidBook {
        bid: Cents,
        ask: Option<Cents>,
    },
    /// Bid deviates from the independent reference price beyond tolerance.
    ExecPriceUntrusted {
        bid: Cents,
        reference: Cents,
        deviation: Cents,
    },
}

impl QualityVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Short label for logs and breaker records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::NoExecutionPrice => "NO_EXECUTION_PRICE",
            Self::InvalidBook { .. } => "INVALID_BOOK",
            Self::ExecPriceUntrusted { .. } => "EXEC_PRICE_UNTRUSTED",
        }
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoExecutionPrice => write!(f, "NO_EXECUTION_PRICE"),
            Self::InvalidBook { bid, ask } => match ask {
                Some(ask) => write!(f, "INVALID_BOOK(bid={bid}, ask={ask})"),
                None => write!(f, "INVALID_BOOK(bid={bid}, no ask)"),
            },
            Self::ExecPriceUntrusted {
                bid,
                reference,
                deviation,
            } => write!(
                f,
                "EXEC_PRICE_UNTRUSTED(bid={bid}, ref={reference}, dev={deviation})"
            ),
        }
    }
}

/// Pure validator of order-book health.
#[derive(Debug, Clone)]
pub struct OrderbookQualityValidator {
    config: QualityConfig,
}

impl OrderbookQualityValidator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Classify the book. Checks run in fixed order; the first failure wins.
    ///
    /// 1. NO_EXECUTION_PRICE — bid absent or zero
    /// 2. INVALID_BOOK — bid > ask, or bid under the sanity floor while the
    ///    ask is over the sanity ceiling
    /// 3. EXEC_PRICE_UNTRUSTED — bid deviates from `reference` beyond the
    ///    configured cents tolerance
    /// 4. VALID
    pub fn validate(
        &self,
        bid: Option<Cents>,
        ask: Option<Cents>,
        reference: Option<Cents>,
    ) -> QualityVerdict {
        let bid = match bid {
            Some(b) if b.is_positive() => b,
            _ => return QualityVerdict::NoExecutionPrice,
        };

        if let Some(ask) = ask {
            if bid > ask {
                return QualityVerdict::InvalidBook {
                    bid,
                    ask: Some(ask),
                };
            }
            if bid.inner() < self.config.low_sanity_floor_cents
                && ask.inner() > self.config.high_sanity_ceiling_cents
            {
                return QualityVerdict::InvalidBook {
                    bid,
                    ask: Some(ask),
                };
            }
        }

        if let Some(reference) = reference {
            let deviation = bid.distance_from(reference);
            if deviation.inner() > self.config.max_reference_deviation_cents {
                return QualityVerdict::ExecPriceUntrusted {
                    bid,
                    reference,
                    deviation,
                };
            }
        }

        QualityVerdict::Valid
    }
}
