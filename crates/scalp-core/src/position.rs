//! Read-only position and quote snapshots.
//!
//! A `Position` is what the portfolio collaborator hands the exit engine
//! once per cycle. The engine never mutates it; all mutable state lives in
//! the engine's own registries keyed by `InstrumentKey`.

use crate::{Cents, InstrumentKey, OrderSide, Shares};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-of-book snapshot for one instrument.
///
/// Absent sides are `None` rather than zero-price sentinels, so "no bid"
/// and "bid at zero" are distinguishable upstream but collapse to the same
/// NO_EXECUTION_PRICE verdict in the quality validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Best bid in cents, if any.
    pub bid: Option<Cents>,
    /// Best ask in cents, if any.
    pub ask: Option<Cents>,
    /// Shares resting at the best bid.
    pub bid_depth: Shares,
}

impl Quote {
    pub fn new(bid: Option<Cents>, ask: Option<Cents>, bid_depth: Shares) -> Self {
        Self {
            bid,
            ask,
            bid_depth,
        }
    }

    /// Two-sided quote with depth.
    pub fn two_sided(bid: Cents, ask: Cents, bid_depth: Shares) -> Self {
        Self::new(Some(bid), Some(ask), bid_depth)
    }

    /// Ask − bid spread in cents, when both sides exist.
    pub fn spread(&self) -> Option<Cents> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }

    /// Does the book have an executable (positive) bid?
    pub fn has_executable_bid(&self) -> bool {
        self.bid.map(|b| b.is_positive()).unwrap_or(false)
    }
}

/// A held position, snapshotted for one evaluation cycle.
///
/// Produced by the portfolio collaborator; the engine treats it as
/// immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument identity.
    pub instrument: InstrumentKey,
    /// Side of the holding (exits only act on `Buy` holdings).
    pub side: OrderSide,
    /// Shares held.
    pub shares: Shares,
    /// Average entry price in cents.
    pub avg_entry: Cents,
    /// Current top of book.
    pub quote: Quote,
    /// Unrealized P&L in percent of entry.
    pub pnl_pct: Decimal,
    /// Unrealized P&L in USD.
    pub pnl_usd: Decimal,
    /// Realized hold duration in milliseconds.
    ///
    /// Under the `AllowAll` legacy policy this value may come from untrusted
    /// entry metadata and still drives hold-time gates (known limitation).
    pub held_ms: u64,
    /// Whether the current price/P&L figures are trusted.
    pub price_trusted: bool,
    /// Whether entry metadata (entry price, entry time) is trusted.
    pub entry_trusted: bool,
    /// Market has resolved; position is redeemable, not tradable.
    pub redeemable: bool,
    /// Instrument currently accepts orders.
    pub tradable: bool,
}

impl Position {
    /// Hold duration in whole minutes.
    pub fn held_minutes(&self) -> u64 {
        self.held_ms / 60_000
    }

    /// Reference price for quality validation: the collaborator's own
    /// last price, derived from P&L. None when entry is untrusted.
    pub fn reference_price(&self) -> Option<Cents> {
        if !self.entry_trusted || self.avg_entry.is_zero() {
            return None;
        }
        // pnl_pct = (current - entry) / entry * 100  =>  current = entry * (1 + pnl/100)
        let factor = Decimal::ONE + self.pnl_pct / Decimal::from(100);
        Some(Cents::new(self.avg_entry.inner() * factor))
    }
}
