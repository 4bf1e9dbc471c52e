//! Exit plan state machine.
//!
//! One `ExitPlan` per instrument with an active liquidation attempt. The
//! plan walks PROFIT → BREAKEVEN → FORCE on a wall-clock schedule that is
//! independent of the eligibility decision that created it, with a side
//! branch into ILLIQUID_DEFERRED whenever the book is too thin to work.
//!
//! Stage schedule for window W (boundaries inclusive):
//! - elapsed < 0.6W         → PROFIT (hold out for the target price)
//! - 0.6W ≤ elapsed < W     → BREAKEVEN (recover entry, never cross it)
//! - elapsed ≥ W            → FORCE (hit the bid, recover capital)

use rust_decimal::Decimal;
use scalp_core::{Cents, InstrumentKey, Shares};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::illiquidity::IlliquidityVerdict;

/// A tenth of a cent: the minimum increment above entry for PROFIT limits.
fn tick() -> Cents {
    Cents::new(Decimal::new(1, 1))
}

// ============================================================================
// ExitStage
// ============================================================================

/// Stage of the exit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStage {
    /// Hold out for the target price (limit strictly above entry).
    Profit,
    /// Recover entry; never quote below it.
    Breakeven,
    /// Hit the bid; accept a loss to recover capital.
    Force,
    /// Book too thin to work; waiting on a liquidity recheck.
    IlliquidDeferred,
}

impl ExitStage {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::IlliquidDeferred)
    }

    /// Position on the time ladder. Deferral sits outside the ladder.
    fn ladder_rank(self) -> u8 {
        match self {
            Self::Profit | Self::IlliquidDeferred => 0,
            Self::Breakeven => 1,
            Self::Force => 2,
        }
    }
}

impl fmt::Display for ExitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profit => write!(f, "PROFIT"),
            Self::Breakeven => write!(f, "BREAKEVEN"),
            Self::Force => write!(f, "FORCE"),
            Self::IlliquidDeferred => write!(f, "ILLIQUID_DEFERRED"),
        }
    }
}

/// Time-based stage for an elapsed duration within window `window_ms`.
///
/// Uses cross-multiplication so the 0.6W boundary is exact in integer math.
pub fn stage_for_elapsed(elapsed_ms: u64, window_ms: u64) -> ExitStage {
    if elapsed_ms >= window_ms {
        ExitStage::Force
    } else if (elapsed_ms as u128) * 10 >= (window_ms as u128) * 6 {
        ExitStage::Breakeven
    } else {
        ExitStage::Profit
    }
}

// ============================================================================
// PlanOutcome
// ============================================================================

/// Terminal outcome of a plan. The plan is removed on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    /// Exit order accepted; position unwound.
    Filled,
    /// Notional under the exchange minimum; dust cooldown armed.
    AbandonedDust,
    /// FORCE stage outlived the configured multiple of the window.
    AbandonedMaxAttempts,
    /// Liquidity never returned within the recheck bound.
    AbandonedIlliquid,
}

impl PlanOutcome {
    pub fn is_abandonment(&self) -> bool {
        !matches!(self, Self::Filled)
    }
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filled => write!(f, "FILLED"),
            Self::AbandonedDust => write!(f, "ABANDONED_DUST"),
            Self::AbandonedMaxAttempts => write!(f, "ABANDONED_MAX_ATTEMPTS"),
            Self::AbandonedIlliquid => write!(f, "ABANDONED_ILLIQUID"),
        }
    }
}

// ============================================================================
// BlockedReason
// ============================================================================

/// Why the most recent cycle could not attempt this plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedReason {
    /// Deferred on an illiquidity verdict.
    Illiquid(IlliquidityVerdict),
    /// Quality gate failed; the breaker holds the detail.
    BadBook { label: &'static str },
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Illiquid(v) => write!(f, "illiquid:{v}"),
            Self::BadBook { label } => write!(f, "bad_book:{label}"),
        }
    }
}

// ============================================================================
// ExitPlan
// ============================================================================

/// Per-instrument liquidation attempt state. At most one live plan per
/// instrument; created on the first "exit now" decision, destroyed on fill,
/// abandonment, or when the instrument leaves the live position set.
#[derive(Debug, Clone)]
pub struct ExitPlan {
    /// Instrument being unwound.
    pub instrument: InstrumentKey,
    /// Plan creation time (Unix ms). Stage timing is measured from here.
    pub created_at_ms: u64,
    /// Current ladder stage.
    pub stage: ExitStage,
    /// Time of the most recent submission attempt.
    pub last_attempt_ms: Option<u64>,
    /// Attempts within the current stage; reset on every stage change
    /// except into/out of ILLIQUID_DEFERRED.
    pub attempts: u32,
    /// Average entry price at creation.
    pub avg_entry: Cents,
    /// Initial target price.
    pub target: Cents,
    /// Shares held at creation.
    pub shares: Shares,
    /// P&L percent when the plan was created.
    pub initial_pnl_pct: Decimal,
    /// P&L USD when the plan was created.
    pub initial_pnl_usd: Decimal,
    /// Why the last cycle could not attempt, if it couldn't.
    pub blocked: Option<BlockedReason>,
    /// Illiquidity backoff ladder index.
    pub backoff_level: usize,
    /// Earliest time of the next liquidity recheck while deferred.
    pub next_recheck_ms: u64,
    /// Consecutive illiquid rechecks; abandonment at the configured bound.
    pub illiquid_rechecks: u32,
}

impl ExitPlan {
    pub fn new(
        instrument: InstrumentKey,
        avg_entry: Cents,
        target: Cents,
        shares: Shares,
        initial_pnl_pct: Decimal,
        initial_pnl_usd: Decimal,
        now_ms: u64,
    ) -> Self {
        Self {
            instrument,
            created_at_ms: now_ms,
            stage: ExitStage::Profit,
            last_attempt_ms: None,
            attempts: 0,
            avg_entry,
            target,
            shares,
            initial_pnl_pct,
            initial_pnl_usd,
            blocked: None,
            backoff_level: 0,
            next_recheck_ms: 0,
            illiquid_rechecks: 0,
        }
    }

    /// Milliseconds since plan creation (saturating against clock skew).
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// Advance the time-based stage. No-op while deferred (the deferral
    /// branch owns its own schedule). Returns `(from, to)` on a change.
    ///
    /// Any change here resets the attempt counter; transitions into/out of
    /// ILLIQUID_DEFERRED go through `defer`/`recover` and do not.
    pub fn advance_stage(&mut self, now_ms: u64, window_ms: u64) -> Option<(ExitStage, ExitStage)> {
        if self.stage.is_deferred() {
            return None;
        }
        let next = stage_for_elapsed(self.elapsed_ms(now_ms), window_ms);
        // Forward only: a regressing clock must not demote the stage.
        if next.ladder_rank() <= self.stage.ladder_rank() {
            return None;
        }
        let from = self.stage;
        self.stage = next;
        self.attempts = 0;
        self.last_attempt_ms = None;
        Some((from, next))
    }

    /// Limit price for the current stage given the live bid.
    ///
    /// | Stage      | Limit price                                           |
    /// |------------|-------------------------------------------------------|
    /// | PROFIT     | max(target, bid), forced strictly above entry         |
    /// | BREAKEVEN  | max(entry, bid) when bid ≥ entry, else entry          |
    /// | FORCE      | bid                                                   |
    ///
    /// Deferred plans never price an attempt; `target` is reported for
    /// diagnostics only.
    pub fn limit_price(&self, bid: Cents) -> Option<Cents> {
        match self.stage {
            ExitStage::Profit => {
                let base = self.target.max(bid);
                if base > self.avg_entry {
                    Some(base)
                } else {
                    Some(self.avg_entry + tick())
                }
            }
            ExitStage::Breakeven => {
                if bid >= self.avg_entry {
                    Some(bid)
                } else {
                    Some(self.avg_entry)
                }
            }
            ExitStage::Force => Some(bid),
            ExitStage::IlliquidDeferred => None,
        }
    }

    /// Lowest price the current stage would accept, fed to the
    /// illiquidity detector. FORCE accepts any executable bid.
    pub fn min_acceptable(&self) -> Cents {
        match self.stage {
            ExitStage::Profit | ExitStage::Breakeven => self.avg_entry,
            ExitStage::Force | ExitStage::IlliquidDeferred => Cents::ZERO,
        }
    }

    /// Retry cadence: the first attempt of a stage is exempt; afterwards an
    /// attempt requires `retry_interval_ms` since the previous one.
    pub fn can_attempt(&self, now_ms: u64, retry_interval_ms: u64) -> bool {
        if self.attempts == 0 {
            return true;
        }
        match self.last_attempt_ms {
            Some(last) => now_ms.saturating_sub(last) >= retry_interval_ms,
            None => true,
        }
    }

    /// Record a non-fill submission attempt.
    pub fn record_attempt(&mut self, now_ms: u64) {
        self.attempts += 1;
        self.last_attempt_ms = Some(now_ms);
    }

    /// Has the FORCE stage outlived the abandonment deadline?
    pub fn force_expired(&self, now_ms: u64, deadline_ms: u64) -> bool {
        self.stage == ExitStage::Force && self.elapsed_ms(now_ms) > deadline_ms
    }

    // ------------------------------------------------------------------
    // Illiquidity deferral
    // ------------------------------------------------------------------

    /// Enter ILLIQUID_DEFERRED at backoff level 0. Does not touch the
    /// attempt counter.
    pub fn defer(&mut self, verdict: IlliquidityVerdict, now_ms: u64, backoff_ladder: &[u64]) {
        self.stage = ExitStage::IlliquidDeferred;
        self.blocked = Some(BlockedReason::Illiquid(verdict));
        self.backoff_level = 0;
        self.next_recheck_ms = now_ms + backoff_ladder.first().copied().unwrap_or(60_000);
    }

    /// Is the deferred plan due for a liquidity recheck?
    pub fn recheck_due(&self, now_ms: u64) -> bool {
        self.stage.is_deferred() && now_ms >= self.next_recheck_ms
    }

    /// Record a failed recheck: escalate the backoff (clamped to the ladder)
    /// and bump the consecutive-recheck counter. Returns the new count.
    pub fn record_illiquid_recheck(
        &mut self,
        verdict: IlliquidityVerdict,
        now_ms: u64,
        backoff_ladder: &[u64],
    ) -> u32 {
        self.illiquid_rechecks += 1;
        self.blocked = Some(BlockedReason::Illiquid(verdict));
        self.backoff_level = (self.backoff_level + 1).min(backoff_ladder.len().saturating_sub(1));
        let delay = backoff_ladder
            .get(self.backoff_level)
            .copied()
            .unwrap_or(60_000);
        self.next_recheck_ms = now_ms + delay;
        self.illiquid_rechecks
    }

    /// Liquidity returned: back to PROFIT with clean backoff state. The
    /// attempt counter survives (deferral transitions are exempt from the
    /// reset rule); the time-based stage advance will reset it if the plan
    /// has meanwhile aged into a later stage.
    pub fn recover(&mut self) {
        self.stage = ExitStage::Profit;
        self.blocked = None;
        self.backoff_level = 0;
        self.next_recheck_ms = 0;
        self.illiquid_rechecks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const W: u64 = 1_800_000; // 30 minutes

    fn plan() -> ExitPlan {
        ExitPlan::new(
            InstrumentKey::new("0xmkt", "1"),
            Cents::new(dec!(50)),
            Cents::new(dec!(55)),
            Shares::new(dec!(100)),
            dec!(10),
            dec!(5),
            1_000_000,
        )
    }

    fn cents(v: rust_decimal::Decimal) -> Cents {
        Cents::new(v)
    }

    // ------------------------------------------------------------------
    // Stage timing
    // ------------------------------------------------------------------

    #[test]
    fn test_stage_boundaries_inclusive() {
        // For window W: BREAKEVEN at exactly 0.6W, FORCE at exactly W.
        assert_eq!(stage_for_elapsed(0, W), ExitStage::Profit);
        assert_eq!(stage_for_elapsed(1_079_999, W), ExitStage::Profit);
        assert_eq!(stage_for_elapsed(1_080_000, W), ExitStage::Breakeven);
        assert_eq!(stage_for_elapsed(1_799_999, W), ExitStage::Breakeven);
        assert_eq!(stage_for_elapsed(1_800_000, W), ExitStage::Force);
        assert_eq!(stage_for_elapsed(10 * W, W), ExitStage::Force);
    }

    #[test]
    fn test_stage_boundary_exact_for_odd_window() {
        // 0.6 × 1000001 = 600000.6; integer cross-multiplication must not
        // round the boundary down.
        let w = 1_000_001;
        assert_eq!(stage_for_elapsed(600_000, w), ExitStage::Profit);
        assert_eq!(stage_for_elapsed(600_001, w), ExitStage::Breakeven);
    }

    #[test]
    fn test_advance_resets_attempts() {
        let mut p = plan();
        p.record_attempt(1_000_100);
        p.record_attempt(1_015_100);
        assert_eq!(p.attempts, 2);

        let change = p.advance_stage(1_000_000 + 1_080_000, W);
        assert_eq!(change, Some((ExitStage::Profit, ExitStage::Breakeven)));
        assert_eq!(p.attempts, 0);
        assert_eq!(p.last_attempt_ms, None);
    }

    #[test]
    fn test_advance_monotonic_forward_only() {
        let mut p = plan();
        p.advance_stage(1_000_000 + W, W);
        assert_eq!(p.stage, ExitStage::Force);
        // Later calls with the same clock stay in FORCE.
        assert_eq!(p.advance_stage(1_000_000 + W + 1, W), None);
        assert_eq!(p.stage, ExitStage::Force);
    }

    #[test]
    fn test_clock_regression_does_not_demote_stage() {
        let mut p = plan();
        p.advance_stage(1_000_000 + W, W);
        assert_eq!(p.stage, ExitStage::Force);

        // A clock that jumps backward leaves the stage where it was.
        assert_eq!(p.advance_stage(1_000_000 + 1_080_000, W), None);
        assert_eq!(p.stage, ExitStage::Force);
        assert_eq!(p.advance_stage(1_000_000, W), None);
        assert_eq!(p.stage, ExitStage::Force);
    }

    #[test]
    fn test_advance_noop_while_deferred() {
        let mut p = plan();
        p.defer(
            IlliquidityVerdict::TinyBid {
                bid: cents(dec!(1)),
            },
            1_000_000,
            &[60_000],
        );
        assert_eq!(p.advance_stage(1_000_000 + 10 * W, W), None);
        assert_eq!(p.stage, ExitStage::IlliquidDeferred);
    }

    // ------------------------------------------------------------------
    // Limit prices
    // ------------------------------------------------------------------

    #[test]
    fn test_profit_limit_takes_better_of_target_and_bid() {
        let p = plan();
        assert_eq!(p.limit_price(cents(dec!(52))), Some(cents(dec!(55))));
        assert_eq!(p.limit_price(cents(dec!(58))), Some(cents(dec!(58))));
    }

    #[test]
    fn test_profit_limit_strictly_above_entry() {
        // Target at/below entry: price is forced to entry + 0.1¢.
        let mut p = plan();
        p.target = cents(dec!(50));
        let limit = p.limit_price(cents(dec!(49))).unwrap();
        assert_eq!(limit, cents(dec!(50.1)));
        assert!(limit > p.avg_entry);
    }

    #[test]
    fn test_breakeven_limit_never_crosses_entry() {
        let mut p = plan();
        p.stage = ExitStage::Breakeven;
        // Bid above entry: sell at the bid.
        assert_eq!(p.limit_price(cents(dec!(53))), Some(cents(dec!(53))));
        // Bid below entry: quote entry, do not cross down.
        assert_eq!(p.limit_price(cents(dec!(47))), Some(cents(dec!(50))));
        // Bid exactly at entry.
        assert_eq!(p.limit_price(cents(dec!(50))), Some(cents(dec!(50))));
    }

    #[test]
    fn test_force_limit_hits_the_bid() {
        let mut p = plan();
        p.stage = ExitStage::Force;
        assert_eq!(p.limit_price(cents(dec!(31))), Some(cents(dec!(31))));
    }

    #[test]
    fn test_deferred_has_no_limit_price() {
        let mut p = plan();
        p.stage = ExitStage::IlliquidDeferred;
        assert_eq!(p.limit_price(cents(dec!(60))), None);
    }

    // ------------------------------------------------------------------
    // Retry cadence
    // ------------------------------------------------------------------

    #[test]
    fn test_first_attempt_of_stage_exempt_from_cadence() {
        let p = plan();
        assert!(p.can_attempt(1_000_000, 15_000));
    }

    #[test]
    fn test_cadence_enforced_after_first_attempt() {
        let mut p = plan();
        p.record_attempt(1_000_000);
        assert!(!p.can_attempt(1_014_999, 15_000));
        assert!(p.can_attempt(1_015_000, 15_000));
    }

    #[test]
    fn test_stage_change_grants_immediate_attempt() {
        let mut p = plan();
        p.record_attempt(1_000_000);
        p.advance_stage(1_000_000 + 1_080_000, W);
        // New stage, counter reset: exempt again.
        assert!(p.can_attempt(1_000_000 + 1_080_001, 15_000));
    }

    // ------------------------------------------------------------------
    // Illiquidity deferral
    // ------------------------------------------------------------------

    #[test]
    fn test_defer_schedules_first_recheck() {
        let mut p = plan();
        let ladder = [60_000, 300_000, 900_000];
        p.defer(
            IlliquidityVerdict::TinyBid {
                bid: cents(dec!(1)),
            },
            2_000_000,
            &ladder,
        );
        assert_eq!(p.stage, ExitStage::IlliquidDeferred);
        assert_eq!(p.backoff_level, 0);
        assert!(!p.recheck_due(2_059_999));
        assert!(p.recheck_due(2_060_000));
    }

    #[test]
    fn test_backoff_escalates_and_clamps() {
        let mut p = plan();
        let ladder = [60_000, 300_000, 900_000];
        let verdict = IlliquidityVerdict::TinyBid {
            bid: cents(dec!(1)),
        };
        p.defer(verdict, 0, &ladder);

        p.record_illiquid_recheck(verdict, 60_000, &ladder);
        assert_eq!(p.backoff_level, 1);
        assert_eq!(p.next_recheck_ms, 360_000);

        p.record_illiquid_recheck(verdict, 360_000, &ladder);
        assert_eq!(p.backoff_level, 2);

        // Clamped at the last rung.
        p.record_illiquid_recheck(verdict, 1_260_000, &ladder);
        assert_eq!(p.backoff_level, 2);
        assert_eq!(p.illiquid_rechecks, 3);
    }

    #[test]
    fn test_recover_returns_to_profit_clean() {
        let mut p = plan();
        let ladder = [60_000];
        let verdict = IlliquidityVerdict::ExtremeSpread {
            spread: cents(dec!(20)),
        };
        p.record_attempt(1_000_100);
        p.defer(verdict, 1_001_000, &ladder);
        p.record_illiquid_recheck(verdict, 1_061_000, &ladder);

        p.recover();
        assert_eq!(p.stage, ExitStage::Profit);
        assert_eq!(p.blocked, None);
        assert_eq!(p.backoff_level, 0);
        assert_eq!(p.illiquid_rechecks, 0);
        // Deferral transitions do not reset the attempt counter.
        assert_eq!(p.attempts, 1);
    }

    // ------------------------------------------------------------------
    // FORCE expiry
    // ------------------------------------------------------------------

    #[test]
    fn test_force_expired_after_deadline() {
        let mut p = plan();
        p.stage = ExitStage::Force;
        let deadline = 2 * W;
        assert!(!p.force_expired(1_000_000 + deadline, deadline));
        assert!(p.force_expired(1_000_000 + deadline + 1, deadline));
    }

    #[test]
    fn test_force_expiry_only_in_force() {
        let p = plan();
        assert!(!p.force_expired(1_000_000 + 10 * W, 2 * W));
    }
}
