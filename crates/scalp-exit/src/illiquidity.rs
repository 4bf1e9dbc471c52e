//! Illiquidity detection.
//!
//! Pure classifier separating "book is thin or badly mispriced" (defer the
//! plan) from "book is merely below target" (keep retrying on the normal
//! cadence). An absent bid is NOT flagged here; that case is classified as
//! NO_EXECUTION_PRICE by the quality validator.

use scalp_core::Cents;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::IlliquidityConfig;

/// Verdict on depth/spread adequacy for one planned exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IlliquidityVerdict {
    /// Book depth and spread are workable.
    Liquid,
    /// Ask−bid spread exceeds the absolute cents threshold.
    ExtremeSpread { spread: Cents },
    /// Bid pinned near zero while the exit wants a meaningful price.
    TinyBid { bid: Cents },
    /// Bid below half of the minimum acceptable price.
    BidFarBelowMin { bid: Cents, min_acceptable: Cents },
}

impl IlliquidityVerdict {
    pub fn is_illiquid(&self) -> bool {
        !matches!(self, Self::Liquid)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Liquid => "LIQUID",
            Self::ExtremeSpread { .. } => "EXTREME_SPREAD",
            Self::TinyBid { .. } => "TINY_BID",
            Self::BidFarBelowMin { .. } => "BID_FAR_BELOW_MIN",
        }
    }
}

impl fmt::Display for IlliquidityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liquid => write!(f, "LIQUID"),
            Self::ExtremeSpread { spread } => write!(f, "EXTREME_SPREAD(spread={spread})"),
            Self::TinyBid { bid } => write!(f, "TINY_BID(bid={bid})"),
            Self::BidFarBelowMin {
                bid,
                min_acceptable,
            } => write!(f, "BID_FAR_BELOW_MIN(bid={bid}, min={min_acceptable})"),
        }
    }
}

/// Pure detector of inadequate depth/spread.
#[derive(Debug, Clone)]
pub struct IlliquidityDetector {
    config: IlliquidityConfig,
}

impl IlliquidityDetector {
    pub fn new(config: IlliquidityConfig) -> Self {
        Self { config }
    }

    /// Assess the book against the plan's target and minimum acceptable
    /// price. Rules run in fixed order; the first match wins.
    ///
    /// 1. EXTREME_SPREAD — ask−bid beyond the absolute cents threshold
    /// 2. TINY_BID — bid at/below the tiny floor while the target or
    ///    minimum acceptable price sits far above it
    /// 3. BID_FAR_BELOW_MIN — bid below half of the minimum acceptable
    pub fn assess(
        &self,
        bid: Option<Cents>,
        ask: Option<Cents>,
        target: Cents,
        min_acceptable: Cents,
    ) -> IlliquidityVerdict {
        let bid = match bid {
            Some(b) => b,
            // Handled as NO_BID by the quality gate.
            None => return IlliquidityVerdict::Liquid,
        };

        if let Some(ask) = ask {
            let spread = ask - bid;
            if spread.inner() > self.config.extreme_spread_cents {
                return IlliquidityVerdict::ExtremeSpread { spread };
            }
        }

        let wants_meaningful_price = target.inner() >= self.config.target_floor_cents
            || min_acceptable.inner() >= self.config.target_floor_cents;
        if bid.inner() <= self.config.tiny_bid_floor_cents && wants_meaningful_price {
            return IlliquidityVerdict::TinyBid { bid };
        }

        if min_acceptable.is_positive()
            && bid.inner() < min_acceptable.inner() / rust_decimal::Decimal::TWO
        {
            return IlliquidityVerdict::BidFarBelowMin {
                bid,
                min_acceptable,
            };
        }

        IlliquidityVerdict::Liquid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn detector() -> IlliquidityDetector {
        IlliquidityDetector::new(IlliquidityConfig::default())
    }

    fn cents(v: rust_decimal::Decimal) -> Cents {
        Cents::new(v)
    }

    #[test]
    fn test_tiny_bid_against_meaningful_target() {
        // target=80¢, min acceptable=50¢, best bid=1¢ → illiquid, tiny-bid reason
        let d = detector();
        let verdict = d.assess(
            Some(cents(dec!(1))),
            Some(cents(dec!(5))),
            cents(dec!(80)),
            cents(dec!(50)),
        );
        assert!(verdict.is_illiquid());
        assert_eq!(verdict.label(), "TINY_BID");
    }

    #[test]
    fn test_extreme_spread() {
        let d = detector();
        // 30¢ bid / 45¢ ask: 15¢ spread > 10¢ threshold
        let verdict = d.assess(
            Some(cents(dec!(30))),
            Some(cents(dec!(45))),
            cents(dec!(40)),
            cents(dec!(30)),
        );
        assert_eq!(verdict.label(), "EXTREME_SPREAD");
    }

    #[test]
    fn test_spread_checked_before_tiny_bid() {
        let d = detector();
        // Tiny bid AND extreme spread: spread rule is first.
        let verdict = d.assess(
            Some(cents(dec!(1))),
            Some(cents(dec!(60))),
            cents(dec!(80)),
            cents(dec!(50)),
        );
        assert_eq!(verdict.label(), "EXTREME_SPREAD");
    }

    #[test]
    fn test_bid_below_half_min() {
        let d = detector();
        // bid 20¢ < 50¢/2, spread fine, not tiny
        let verdict = d.assess(
            Some(cents(dec!(20))),
            Some(cents(dec!(24))),
            cents(dec!(60)),
            cents(dec!(50)),
        );
        assert_eq!(verdict.label(), "BID_FAR_BELOW_MIN");
    }

    #[test]
    fn test_bid_at_half_min_is_liquid() {
        let d = detector();
        let verdict = d.assess(
            Some(cents(dec!(25))),
            Some(cents(dec!(28))),
            cents(dec!(30)),
            cents(dec!(50)),
        );
        assert!(!verdict.is_illiquid());
    }

    #[test]
    fn test_below_target_but_liquid_keeps_retrying() {
        // Book merely below target: not a liquidity problem.
        let d = detector();
        let verdict = d.assess(
            Some(cents(dec!(55))),
            Some(cents(dec!(57))),
            cents(dec!(70)),
            cents(dec!(55)),
        );
        assert!(!verdict.is_illiquid());
    }

    #[test]
    fn test_tiny_bid_with_cheap_target_is_liquid() {
        // Everything is cheap; a 1¢ bid on a 5¢ target is just a cheap market.
        let d = detector();
        let verdict = d.assess(
            Some(cents(dec!(1))),
            Some(cents(dec!(3))),
            cents(dec!(5)),
            cents(dec!(1)),
        );
        assert!(!verdict.is_illiquid());
    }

    #[test]
    fn test_absent_bid_not_flagged_here() {
        let d = detector();
        let verdict = d.assess(None, Some(cents(dec!(50))), cents(dec!(80)), cents(dec!(50)));
        assert!(!verdict.is_illiquid());
    }
}
