//! Exit eligibility evaluation.
//!
//! Decides whether a position should START liquidating. Rules run in fixed
//! precedence, first match wins; later rules never see a position a prior
//! rule has decided. The plan state machine takes over once a plan exists,
//! so these rules fire at most once per position lifetime.
//!
//! Two implementations of one trait, selected by the legacy-metadata
//! policy: the full rule set for trusted entries, a P&L-only check for
//! positions whose entry metadata cannot be trusted.

use rust_decimal::Decimal;
use scalp_core::Position;
use std::fmt;

use crate::config::EligibilityConfig;
use crate::history::MomentumSnapshot;

// ============================================================================
// Decision types
// ============================================================================

/// Why a position should start exiting now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Low-price volatile entry with any positive P&L.
    LowPriceProfit,
    /// Low-price volatile entry held past its max, tolerable loss.
    LowPriceTimeLoss,
    /// Price spiked beyond the threshold within the short window.
    SuddenSpike,
    /// P&L far beyond the target.
    ExtremeProfit,
    /// Max hold exceeded on a resolution-excluded near-certain winner.
    CapitalRelease,
    /// Target profit reached.
    TargetReached,
    /// Max hold exceeded with minimum profit satisfied.
    MaxHoldProfit,
    /// Momentum faded: slope, spread, or depth signal.
    MomentumFade,
    /// P&L-only evaluator: minimum % and USD both cleared.
    PnlThreshold,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LowPriceProfit => "LOW_PRICE_PROFIT",
            Self::LowPriceTimeLoss => "LOW_PRICE_TIME_LOSS",
            Self::SuddenSpike => "SUDDEN_SPIKE",
            Self::ExtremeProfit => "EXTREME_PROFIT",
            Self::CapitalRelease => "CAPITAL_RELEASE",
            Self::TargetReached => "TARGET_REACHED",
            Self::MaxHoldProfit => "MAX_HOLD_PROFIT",
            Self::MomentumFade => "MOMENTUM_FADE",
            Self::PnlThreshold => "PNL_THRESHOLD",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a position should keep being held this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Low-price volatile entry: no profit yet, not past its max hold.
    LowPriceWaiting,
    /// Low-price volatile entry past max hold but the loss is too deep.
    LowPriceLossTooDeep,
    /// Near-certain winner protected from early time-based exit.
    ResolutionExclusion,
    /// Minimum hold time not yet reached.
    MinHoldNotMet,
    /// Minimum profit (% or USD) not cleared.
    ProfitBelowMinimum,
    /// Profitable and past min hold, but nothing says "now".
    NoExitSignal,
}

impl HoldReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LowPriceWaiting => "LOW_PRICE_WAITING",
            Self::LowPriceLossTooDeep => "LOW_PRICE_LOSS_TOO_DEEP",
            Self::ResolutionExclusion => "RESOLUTION_EXCLUSION",
            Self::MinHoldNotMet => "MIN_HOLD_NOT_MET",
            Self::ProfitBelowMinimum => "PROFIT_BELOW_MINIMUM",
            Self::NoExitSignal => "NO_EXIT_SIGNAL",
        }
    }
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Evaluation outcome for one position in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Exit(ExitReason),
    Hold(HoldReason),
}

impl ExitDecision {
    pub fn should_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }
}

impl fmt::Display for ExitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(r) => write!(f, "EXIT({})", r.label()),
            Self::Hold(r) => write!(f, "HOLD({})", r.label()),
        }
    }
}

// ============================================================================
// Evaluator trait + implementations
// ============================================================================

/// Start-exit-now decision for one position snapshot.
pub trait EligibilityEvaluator {
    fn evaluate(&self, position: &Position, momentum: &MomentumSnapshot) -> ExitDecision;
}

/// Full rule set for positions with trusted entry metadata.
#[derive(Debug, Clone)]
pub struct ScalpEvaluator {
    config: EligibilityConfig,
}

impl ScalpEvaluator {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    /// Is the entry cheap enough for low-price volatile handling?
    fn low_price_mode(&self, position: &Position) -> bool {
        self.config.low_price_entry_cents > Decimal::ZERO
            && position.avg_entry.inner() <= self.config.low_price_entry_cents
    }

    fn low_price_rule(&self, position: &Position) -> ExitDecision {
        if position.pnl_pct > Decimal::ZERO {
            return ExitDecision::Exit(ExitReason::LowPriceProfit);
        }
        if position.held_ms > self.config.low_price_max_hold_ms {
            if position.pnl_pct.abs() <= self.config.low_price_max_loss_pct {
                return ExitDecision::Exit(ExitReason::LowPriceTimeLoss);
            }
            return ExitDecision::Hold(HoldReason::LowPriceLossTooDeep);
        }
        ExitDecision::Hold(HoldReason::LowPriceWaiting)
    }

    /// Entry was cheap but the market now treats the outcome as near
    /// certain; the position is likely resolving in our favor, so a
    /// time-based exit would surrender the remaining edge.
    fn resolution_excluded(&self, position: &Position) -> bool {
        let current = match position.quote.bid {
            Some(b) => b,
            None => return false,
        };
        position.avg_entry.inner() <= self.config.resolution_entry_ceiling_cents
            && current.inner() >= self.config.resolution_price_floor_cents
    }

    fn momentum_faded(&self, momentum: &MomentumSnapshot) -> bool {
        if let Some(slope) = momentum.slope {
            if slope <= self.config.slope_threshold {
                return true;
            }
        }
        if let Some(delta) = momentum.spread_delta {
            if delta.inner() >= self.config.spread_widen_cents {
                return true;
            }
        }
        if let Some(fraction) = momentum.depth_fraction {
            if fraction < self.config.depth_thin_fraction {
                return true;
            }
        }
        false
    }
}

impl EligibilityEvaluator for ScalpEvaluator {
    fn evaluate(&self, position: &Position, momentum: &MomentumSnapshot) -> ExitDecision {
        let c = &self.config;

        // 1. Low-price volatile mode decides cheap entries terminally.
        if self.low_price_mode(position) {
            return self.low_price_rule(position);
        }

        // 2. Resolution-exclusion safeguard, with the capital-release
        //    override once max hold is exceeded.
        if self.resolution_excluded(position) {
            if position.held_ms > c.max_hold_ms {
                return ExitDecision::Exit(ExitReason::CapitalRelease);
            }
            return ExitDecision::Hold(HoldReason::ResolutionExclusion);
        }

        let clears_usd_floor = position.pnl_usd >= c.min_profit_usd;

        // 3. Sudden spike inside the short window.
        if let Some(move_pct) = momentum.move_pct_in_window {
            if move_pct.abs() >= c.spike_pct && clears_usd_floor {
                return ExitDecision::Exit(ExitReason::SuddenSpike);
            }
        }

        // 4. Extreme profit.
        let extreme_floor = (c.target_profit_pct * Decimal::from(3)).max(c.extreme_profit_ceiling_pct);
        if position.pnl_pct >= extreme_floor && clears_usd_floor {
            return ExitDecision::Exit(ExitReason::ExtremeProfit);
        }

        // 5. Minimum hold time.
        if position.held_ms < c.min_hold_ms {
            return ExitDecision::Hold(HoldReason::MinHoldNotMet);
        }

        // 6. Minimum profit, both % and USD.
        if position.pnl_pct < c.min_profit_pct || !clears_usd_floor {
            return ExitDecision::Hold(HoldReason::ProfitBelowMinimum);
        }

        // 7. Target profit.
        if position.pnl_pct >= c.target_profit_pct {
            return ExitDecision::Exit(ExitReason::TargetReached);
        }

        // 8. Max hold with minimum profit satisfied.
        if position.held_ms > c.max_hold_ms {
            return ExitDecision::Exit(ExitReason::MaxHoldProfit);
        }

        // 9. Momentum fade. Absent signals never count as a fade.
        if self.momentum_faded(momentum) {
            return ExitDecision::Exit(ExitReason::MomentumFade);
        }

        ExitDecision::Hold(HoldReason::NoExitSignal)
    }
}

/// P&L-only evaluator for untrusted entry metadata: no hold-time gates,
/// no momentum, exit once minimum % and USD are both cleared.
#[derive(Debug, Clone)]
pub struct PnlOnlyEvaluator {
    min_profit_pct: Decimal,
    min_profit_usd: Decimal,
}

impl PnlOnlyEvaluator {
    pub fn new(config: &EligibilityConfig) -> Self {
        Self {
            min_profit_pct: config.min_profit_pct,
            min_profit_usd: config.min_profit_usd,
        }
    }
}

impl EligibilityEvaluator for PnlOnlyEvaluator {
    fn evaluate(&self, position: &Position, _momentum: &MomentumSnapshot) -> ExitDecision {
        if position.pnl_pct >= self.min_profit_pct && position.pnl_usd >= self.min_profit_usd {
            ExitDecision::Exit(ExitReason::PnlThreshold)
        } else {
            ExitDecision::Hold(HoldReason::ProfitBelowMinimum)
        }
    }
}
