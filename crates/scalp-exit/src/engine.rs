//! Per-cycle exit orchestration.
//!
//! `ExitEngine::run_cycle` is the single entry point: it takes the cycle's
//! position snapshot and an explicit clock, so the scheduling mechanism
//! (timer, message, test driver) stays outside. The engine owns every piece
//! of mutable tracking state as plain fields; nothing here is a process
//! singleton, so independent engines never interfere.
//!
//! Cycles must not overlap. The engine takes `&mut self`, which makes
//! overlap unrepresentable in safe code; the caller's scheduler still
//! needs a single-flight guard so a slow pass drops ticks instead of
//! queueing them.
//!
//! Per-position failures are isolated: a submission error is logged and
//! treated as a non-fill, never propagated to abort the remaining
//! positions in the cycle.

use std::collections::{HashMap, HashSet};
use std::fmt;

use scalp_core::{Cents, ExitOrder, InstrumentKey, Position, SubmitOutcome};
use tracing::{debug, info, warn};

use crate::breaker::ExecutionCircuitBreaker;
use crate::config::{ExitEngineConfig, LegacyMetadataPolicy};
use crate::dust::DustCooldownRegistry;
use crate::error::ExitResult;
use crate::evaluator::{
    EligibilityEvaluator, ExitDecision, PnlOnlyEvaluator, ScalpEvaluator,
};
use crate::history::PriceHistory;
use crate::illiquidity::IlliquidityDetector;
use crate::plan::{stage_for_elapsed, BlockedReason, ExitPlan, ExitStage, PlanOutcome};
use crate::quality::OrderbookQualityValidator;
use crate::throttle::LogThrottle;

// ============================================================================
// Collaborator traits
// ============================================================================

/// Read-only portfolio collaborator.
pub trait PortfolioView {
    /// Invalidate the cached snapshot for an instrument after a fill.
    async fn invalidate_cache(&self, instrument: &InstrumentKey);

    /// Legacy hold-time fallback: entry timestamp (Unix ms) for positions
    /// whose snapshot carries no trusted hold duration.
    async fn entry_time_ms(&self, instrument: &InstrumentKey) -> Option<u64>;
}

/// Order-submission collaborator. Price protection, balance checks, and
/// the exchange call live behind this seam.
pub trait OrderSubmitter {
    async fn submit(&self, order: &ExitOrder) -> ExitResult<SubmitOutcome>;
}

// ============================================================================
// Cycle reporting
// ============================================================================

/// Why a position was skipped before evaluation or execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero shares: already exited upstream.
    AlreadyExited,
    /// Market resolved; redemption, not trading, unwinds this.
    Redeemable,
    /// Instrument not accepting orders.
    NotTradable,
    /// Current price/P&L figures untrusted.
    UntrustedPrice,
    /// Untrusted entry metadata under the `skip` legacy policy.
    LegacyMetadata,
    /// No executable bid in the snapshot.
    NoBid,
    /// Circuit breaker cooldown active.
    BreakerDisabled,
    /// Dust cooldown active.
    DustSuppressed,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyExited => "ALREADY_EXITED",
            Self::Redeemable => "REDEEMABLE",
            Self::NotTradable => "NOT_TRADABLE",
            Self::UntrustedPrice => "UNTRUSTED_PRICE",
            Self::LegacyMetadata => "LEGACY_METADATA",
            Self::NoBid => "NO_BID",
            Self::BreakerDisabled => "BREAKER_DISABLED",
            Self::DustSuppressed => "DUST_SUPPRESSED",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters for one engine pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Positions seen this cycle.
    pub evaluated: usize,
    /// Positions skipped by a gate.
    pub skipped: usize,
    /// Evaluator said hold.
    pub holds: usize,
    /// Submission attempts made.
    pub attempts: usize,
    /// Plans that filled.
    pub fills: usize,
    /// Plans abandoned (dust, max attempts, illiquid).
    pub abandoned: usize,
    /// Plans still open after the pass.
    pub plans_open: usize,
}

/// What became of one plan after a cycle drove it.
enum PlanDisposition {
    Keep(ExitPlan),
    Done(PlanOutcome),
}

// ============================================================================
// ExitEngine
// ============================================================================

/// Staged liquidation orchestrator.
pub struct ExitEngine<P, S> {
    config: ExitEngineConfig,
    portfolio: P,
    submitter: S,
    validator: OrderbookQualityValidator,
    detector: IlliquidityDetector,
    evaluator: ScalpEvaluator,
    pnl_only: PnlOnlyEvaluator,
    plans: HashMap<InstrumentKey, ExitPlan>,
    breaker: ExecutionCircuitBreaker,
    dust: DustCooldownRegistry,
    history: PriceHistory,
    throttle: LogThrottle,
}

impl<P, S> ExitEngine<P, S>
where
    P: PortfolioView,
    S: OrderSubmitter,
{
    pub fn new(config: ExitEngineConfig, portfolio: P, submitter: S) -> ExitResult<Self> {
        config.validate()?;
        Ok(Self {
            validator: OrderbookQualityValidator::new(config.quality.clone()),
            detector: IlliquidityDetector::new(config.illiquidity.clone()),
            evaluator: ScalpEvaluator::new(config.eligibility.clone()),
            pnl_only: PnlOnlyEvaluator::new(&config.eligibility),
            plans: HashMap::new(),
            breaker: ExecutionCircuitBreaker::new(config.breaker.clone()),
            dust: DustCooldownRegistry::new(config.sizing.dust_cooldown_ms),
            history: PriceHistory::new(config.history_samples),
            throttle: LogThrottle::new(config.diag_throttle_ms),
            portfolio,
            submitter,
            config,
        })
    }

    /// Number of currently open plans.
    pub fn open_plans(&self) -> usize {
        self.plans.len()
    }

    /// Current plan for an instrument, if one exists.
    pub fn plan(&self, instrument: &InstrumentKey) -> Option<&ExitPlan> {
        self.plans.get(instrument)
    }

    /// Run one full pass over the position snapshot.
    pub async fn run_cycle(&mut self, positions: &[Position], now_ms: u64) -> CycleReport {
        let mut report = CycleReport::default();

        for position in positions {
            report.evaluated += 1;
            if let Some(quote_bid) = position.quote.bid {
                if position.quote.has_executable_bid() {
                    self.history.record(
                        &position.instrument,
                        quote_bid,
                        position.quote.spread(),
                        position.quote.bid_depth,
                        now_ms,
                    );
                }
            }

            if let Some(reason) = self.gate(position) {
                self.log_skip(position, reason, now_ms);
                report.skipped += 1;
                if reason == SkipReason::AlreadyExited {
                    // Position drained outside the engine; drop any plan.
                    self.plans.remove(&position.instrument);
                }
                continue;
            }

            if let Some(plan) = self.plans.remove(&position.instrument) {
                self.drive_plan(plan, position, now_ms, &mut report).await;
                continue;
            }

            self.consider_new_plan(position, now_ms, &mut report).await;
        }

        let live: HashSet<InstrumentKey> =
            positions.iter().map(|p| p.instrument.clone()).collect();
        self.plans.retain(|key, _| live.contains(key));
        self.breaker.gc(&live, now_ms);
        self.dust.gc(&live, now_ms);
        self.history.retain(&live);
        self.throttle.retain(&live);

        report.plans_open = self.plans.len();
        debug!(
            evaluated = report.evaluated,
            skipped = report.skipped,
            attempts = report.attempts,
            fills = report.fills,
            abandoned = report.abandoned,
            plans_open = report.plans_open,
            "Exit cycle complete"
        );
        report
    }

    /// Structural gates that apply before plans and evaluation alike.
    fn gate(&self, position: &Position) -> Option<SkipReason> {
        if !position.shares.is_positive() {
            return Some(SkipReason::AlreadyExited);
        }
        if position.redeemable {
            return Some(SkipReason::Redeemable);
        }
        if !position.tradable {
            return Some(SkipReason::NotTradable);
        }
        if !position.price_trusted {
            return Some(SkipReason::UntrustedPrice);
        }
        None
    }

    fn log_skip(&mut self, position: &Position, reason: SkipReason, now_ms: u64) {
        if self.throttle.allow(&position.instrument, reason.label(), now_ms) {
            debug!(
                instrument = %position.instrument,
                reason = reason.label(),
                "Position skipped"
            );
        }
    }

    // ------------------------------------------------------------------
    // New-plan path
    // ------------------------------------------------------------------

    async fn consider_new_plan(
        &mut self,
        position: &Position,
        now_ms: u64,
        report: &mut CycleReport,
    ) {
        let policy = self.config.eligibility.legacy_policy;
        if !position.entry_trusted && policy == LegacyMetadataPolicy::Skip {
            self.log_skip(position, SkipReason::LegacyMetadata, now_ms);
            report.skipped += 1;
            return;
        }

        if !position.quote.has_executable_bid() {
            self.log_skip(position, SkipReason::NoBid, now_ms);
            report.skipped += 1;
            return;
        }

        if self.breaker.is_disabled(&position.instrument, now_ms) {
            self.log_skip(position, SkipReason::BreakerDisabled, now_ms);
            report.skipped += 1;
            return;
        }

        if self.dust.is_suppressed(&position.instrument, now_ms) {
            self.log_skip(position, SkipReason::DustSuppressed, now_ms);
            report.skipped += 1;
            return;
        }

        // Legacy hold-time fallback: under allow-all, a zero hold duration
        // is more likely missing metadata than a fresh entry.
        let mut snapshot = position.clone();
        if !position.entry_trusted
            && policy == LegacyMetadataPolicy::AllowAll
            && position.held_ms == 0
        {
            if let Some(entry_ms) = self.portfolio.entry_time_ms(&position.instrument).await {
                snapshot.held_ms = now_ms.saturating_sub(entry_ms);
            }
        }

        let momentum = self.history.momentum(
            &position.instrument,
            self.config.eligibility.momentum_ticks,
            self.config.eligibility.spike_window_ms,
            now_ms,
        );

        let decision = if position.entry_trusted || policy == LegacyMetadataPolicy::AllowAll {
            self.evaluator.evaluate(&snapshot, &momentum)
        } else {
            self.pnl_only.evaluate(&snapshot, &momentum)
        };

        let reason = match decision {
            ExitDecision::Hold(hold) => {
                report.holds += 1;
                if self.throttle.allow(&position.instrument, "hold", now_ms) {
                    debug!(
                        instrument = %position.instrument,
                        reason = hold.label(),
                        pnl_pct = %position.pnl_pct,
                        held_min = position.held_minutes(),
                        "Holding position"
                    );
                }
                return;
            }
            ExitDecision::Exit(reason) => reason,
        };

        // Preflight the book so a corrupt snapshot does not seed a doomed
        // plan; a failure here is a breaker failure, not a plan.
        let verdict = self.validator.validate(
            position.quote.bid,
            position.quote.ask,
            position.reference_price(),
        );
        if !verdict.is_valid() {
            self.breaker.record_failure(
                &position.instrument,
                &verdict,
                position.quote.bid,
                position.quote.ask,
                now_ms,
            );
            report.skipped += 1;
            return;
        }
        self.breaker.clear(&position.instrument);

        let target = Cents::new(
            position.avg_entry.inner()
                * (rust_decimal::Decimal::ONE
                    + self.config.eligibility.target_profit_pct / rust_decimal::Decimal::from(100)),
        );
        let plan = ExitPlan::new(
            position.instrument.clone(),
            position.avg_entry,
            target,
            position.shares,
            position.pnl_pct,
            position.pnl_usd,
            now_ms,
        );
        info!(
            instrument = %position.instrument,
            reason = reason.label(),
            entry = %position.avg_entry,
            target = %target,
            pnl_pct = %position.pnl_pct,
            "Exit plan started"
        );

        self.drive_plan(plan, position, now_ms, report).await;
    }

    // ------------------------------------------------------------------
    // Plan execution
    // ------------------------------------------------------------------

    /// Drive one plan for one cycle. The plan arrives removed from the map
    /// and is reinserted unless it reached a terminal outcome.
    async fn drive_plan(
        &mut self,
        plan: ExitPlan,
        position: &Position,
        now_ms: u64,
        report: &mut CycleReport,
    ) {
        match self.step_plan(plan, position, now_ms, report).await {
            PlanDisposition::Keep(plan) => {
                self.plans.insert(position.instrument.clone(), plan);
            }
            PlanDisposition::Done(outcome) => {
                if outcome.is_abandonment() {
                    report.abandoned += 1;
                    warn!(
                        instrument = %position.instrument,
                        outcome = %outcome,
                        "Exit plan abandoned"
                    );
                } else {
                    report.fills += 1;
                }
            }
        }
    }

    async fn step_plan(
        &mut self,
        mut plan: ExitPlan,
        position: &Position,
        now_ms: u64,
        report: &mut CycleReport,
    ) -> PlanDisposition {
        // An active breaker cooldown suppresses the plan for the cycle;
        // without this, a persistently bad book would re-record a failure
        // every cycle and escalate the ladder per cycle instead of per
        // cooldown.
        if self.breaker.is_disabled(&position.instrument, now_ms) {
            self.log_skip(position, SkipReason::BreakerDisabled, now_ms);
            report.skipped += 1;
            return PlanDisposition::Keep(plan);
        }

        // Deferred plans wait for their recheck time, silently.
        if plan.stage.is_deferred() {
            if !plan.recheck_due(now_ms) {
                return PlanDisposition::Keep(plan);
            }
            // Judge the book against the stage the plan would resume into:
            // a plan that has aged into FORCE accepts any executable bid.
            let resume = stage_for_elapsed(
                plan.elapsed_ms(now_ms),
                self.config.window.exit_window_ms,
            );
            let min_acceptable = if resume == ExitStage::Force {
                Cents::ZERO
            } else {
                plan.avg_entry
            };
            let verdict = self.detector.assess(
                position.quote.bid,
                position.quote.ask,
                plan.target,
                min_acceptable,
            );
            if verdict.is_illiquid() {
                let rechecks = plan.record_illiquid_recheck(
                    verdict,
                    now_ms,
                    &self.config.illiquid_backoff.backoff_ladder_ms,
                );
                if rechecks >= self.config.illiquid_backoff.max_rechecks {
                    return PlanDisposition::Done(PlanOutcome::AbandonedIlliquid);
                }
                if self.throttle.allow(&position.instrument, "illiquid", now_ms) {
                    info!(
                        instrument = %position.instrument,
                        verdict = %verdict,
                        rechecks = rechecks,
                        next_recheck_ms = plan.next_recheck_ms,
                        "Still illiquid, recheck deferred"
                    );
                }
                return PlanDisposition::Keep(plan);
            }
            plan.recover();
            info!(
                instrument = %position.instrument,
                "Liquidity recovered, plan resumed"
            );
            // Fall through: the recovered plan executes this same cycle.
        }

        if let Some((from, to)) = plan.advance_stage(now_ms, self.config.window.exit_window_ms) {
            info!(
                instrument = %position.instrument,
                from = %from,
                to = %to,
                elapsed_ms = plan.elapsed_ms(now_ms),
                "Exit stage escalated"
            );
        }

        let bid = match position.quote.bid.filter(|b| b.is_positive()) {
            Some(b) => b,
            None => {
                // No executable price: breaker failure, not an attempt.
                let verdict = self.validator.validate(None, position.quote.ask, None);
                self.breaker.record_failure(
                    &position.instrument,
                    &verdict,
                    position.quote.bid,
                    position.quote.ask,
                    now_ms,
                );
                plan.blocked = Some(BlockedReason::BadBook {
                    label: verdict.label(),
                });
                return PlanDisposition::Keep(plan);
            }
        };

        let limit = match plan.limit_price(bid) {
            Some(limit) => limit,
            None => return PlanDisposition::Keep(plan),
        };

        // Dust gate: current holdings at this limit price.
        let notional = position.shares.notional_usd(limit);
        if notional < self.config.sizing.min_order_usd {
            self.dust.arm(&position.instrument, now_ms);
            info!(
                instrument = %position.instrument,
                notional = %notional,
                min = %self.config.sizing.min_order_usd,
                "Exit notional below minimum"
            );
            return PlanDisposition::Done(PlanOutcome::AbandonedDust);
        }

        // Illiquidity gate.
        let liquidity = self.detector.assess(
            Some(bid),
            position.quote.ask,
            plan.target,
            plan.min_acceptable(),
        );
        if liquidity.is_illiquid() {
            plan.defer(
                liquidity,
                now_ms,
                &self.config.illiquid_backoff.backoff_ladder_ms,
            );
            info!(
                instrument = %position.instrument,
                verdict = %liquidity,
                next_recheck_ms = plan.next_recheck_ms,
                "Plan deferred on illiquidity"
            );
            return PlanDisposition::Keep(plan);
        }

        // Quality gate: blocks the cycle without consuming an attempt.
        let verdict = self.validator.validate(
            Some(bid),
            position.quote.ask,
            position.reference_price(),
        );
        if !verdict.is_valid() {
            self.breaker.record_failure(
                &position.instrument,
                &verdict,
                Some(bid),
                position.quote.ask,
                now_ms,
            );
            plan.blocked = Some(BlockedReason::BadBook {
                label: verdict.label(),
            });
            return PlanDisposition::Keep(plan);
        }
        self.breaker.clear(&position.instrument);
        plan.blocked = None;

        if !plan.can_attempt(now_ms, self.config.window.retry_interval_ms) {
            return PlanDisposition::Keep(plan);
        }

        if plan.force_expired(now_ms, self.config.window.abandon_deadline_ms()) {
            return PlanDisposition::Done(PlanOutcome::AbandonedMaxAttempts);
        }

        let order = ExitOrder::new(position.instrument.clone(), position.shares, limit, now_ms);
        report.attempts += 1;
        match self.submitter.submit(&order).await {
            Ok(outcome) if outcome.is_submitted() => {
                self.portfolio.invalidate_cache(&position.instrument).await;
                info!(
                    instrument = %position.instrument,
                    stage = %plan.stage,
                    limit = %limit,
                    notional = %order.notional_usd,
                    attempts = plan.attempts + 1,
                    "Exit order submitted"
                );
                PlanDisposition::Done(PlanOutcome::Filled)
            }
            Ok(outcome) => {
                if outcome.is_min_size_rejection() {
                    // The exchange disagrees with our sizing floor; treat
                    // it as dust rather than retrying a doomed order.
                    self.dust.arm(&position.instrument, now_ms);
                    return PlanDisposition::Done(PlanOutcome::AbandonedDust);
                }
                plan.record_attempt(now_ms);
                debug!(
                    instrument = %position.instrument,
                    stage = %plan.stage,
                    status = %outcome.status,
                    reason = outcome.reason.as_deref().unwrap_or("-"),
                    attempts = plan.attempts,
                    "Exit attempt not filled"
                );
                PlanDisposition::Keep(plan)
            }
            Err(err) => {
                plan.record_attempt(now_ms);
                warn!(
                    instrument = %position.instrument,
                    stage = %plan.stage,
                    error = %err,
                    attempts = plan.attempts,
                    "Exit submission failed"
                );
                PlanDisposition::Keep(plan)
            }
        }
    }
}
