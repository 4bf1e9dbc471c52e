//! Exit ladder lifecycle integration tests.
//!
//! Drives the engine through multi-cycle plan lifecycles with a recording
//! submitter and an explicit clock:
//! - Stage walk PROFIT → BREAKEVEN → FORCE with per-stage limit pricing
//! - Abandonment once FORCE outlives the deadline
//! - Fill mid-ladder releasing the plan

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use scalp_core::{
    Cents, ExitOrder, InstrumentKey, OrderSide, Position, Quote, Shares, SubmitOutcome,
};
use scalp_exit::{
    ExitEngine, ExitEngineConfig, ExitResult, ExitStage, OrderSubmitter, PortfolioView,
};
use std::sync::Arc;

const T0: u64 = 1_000_000;
const W: u64 = 1_800_000;

struct NullPortfolio;

impl PortfolioView for NullPortfolio {
    async fn invalidate_cache(&self, _instrument: &InstrumentKey) {}

    async fn entry_time_ms(&self, _instrument: &InstrumentKey) -> Option<u64> {
        None
    }
}

/// Records every order; fills only when told to.
#[derive(Clone, Default)]
struct RecordingSubmitter {
    orders: Arc<Mutex<Vec<ExitOrder>>>,
    fill: Arc<Mutex<bool>>,
}

impl RecordingSubmitter {
    fn limits(&self) -> Vec<Cents> {
        self.orders.lock().iter().map(|o| o.limit_price).collect()
    }

    fn set_fill(&self, fill: bool) {
        *self.fill.lock() = fill;
    }
}

impl OrderSubmitter for RecordingSubmitter {
    async fn submit(&self, order: &ExitOrder) -> ExitResult<SubmitOutcome> {
        self.orders.lock().push(order.clone());
        if *self.fill.lock() {
            Ok(SubmitOutcome::submitted())
        } else {
            Ok(SubmitOutcome::failed("no fill"))
        }
    }
}

fn key() -> InstrumentKey {
    InstrumentKey::new("0xmkt", "1")
}

/// 50¢ entry at the given bid, 12% up on trusted figures; the target rule
/// starts a plan on first evaluation.
fn position_at(bid: Decimal) -> Position {
    let bid = Cents::new(bid);
    Position {
        instrument: key(),
        side: OrderSide::Buy,
        shares: Shares::new(dec!(100)),
        avg_entry: Cents::new(dec!(50)),
        quote: Quote::two_sided(bid, bid + Cents::new(dec!(2)), Shares::new(dec!(500))),
        pnl_pct: dec!(12),
        pnl_usd: dec!(6),
        held_ms: 600_000,
        price_trusted: true,
        entry_trusted: true,
        redeemable: false,
        tradable: true,
    }
}

fn engine(
    submitter: RecordingSubmitter,
) -> ExitEngine<NullPortfolio, RecordingSubmitter> {
    ExitEngine::new(ExitEngineConfig::default(), NullPortfolio, submitter)
        .expect("default config validates")
}

#[tokio::test]
async fn test_full_ladder_walk_and_abandonment() {
    let submitter = RecordingSubmitter::default();
    let mut e = engine(submitter.clone());

    // Cycle 1: plan starts in PROFIT; limit is the better of target (55¢)
    // and bid (56¢).
    let report = e.run_cycle(&[position_at(dec!(56))], T0).await;
    assert_eq!(report.attempts, 1);
    assert_eq!(e.plan(&key()).unwrap().stage, ExitStage::Profit);

    // Cycle 2 at exactly 0.6W: BREAKEVEN. Bid sits under entry, so the
    // limit holds the 50¢ entry line.
    let report = e.run_cycle(&[position_at(dec!(47))], T0 + W * 6 / 10).await;
    assert_eq!(report.attempts, 1);
    assert_eq!(e.plan(&key()).unwrap().stage, ExitStage::Breakeven);

    // Cycle 3 at exactly W: FORCE hits the bid.
    let report = e.run_cycle(&[position_at(dec!(43))], T0 + W).await;
    assert_eq!(report.attempts, 1);
    assert_eq!(e.plan(&key()).unwrap().stage, ExitStage::Force);

    assert_eq!(
        submitter.limits(),
        vec![
            Cents::new(dec!(56)),
            Cents::new(dec!(50)),
            Cents::new(dec!(43)),
        ]
    );

    // Past 2×W the unfilled FORCE plan is abandoned, without another order.
    let report = e.run_cycle(&[position_at(dec!(43))], T0 + 2 * W + 1).await;
    assert_eq!(report.abandoned, 1);
    assert_eq!(e.open_plans(), 0);
    assert_eq!(submitter.orders.lock().len(), 3);
}

#[tokio::test]
async fn test_fill_mid_ladder_releases_plan() {
    let submitter = RecordingSubmitter::default();
    let mut e = engine(submitter.clone());

    e.run_cycle(&[position_at(dec!(56))], T0).await;
    assert_eq!(e.open_plans(), 1);

    // The book comes back above entry in BREAKEVEN and the order fills.
    submitter.set_fill(true);
    let report = e.run_cycle(&[position_at(dec!(52))], T0 + W * 6 / 10).await;
    assert_eq!(report.fills, 1);
    assert_eq!(e.open_plans(), 0);

    // Next cycle re-evaluates from scratch; nothing lingers.
    submitter.set_fill(false);
    let report = e.run_cycle(&[position_at(dec!(56))], T0 + W).await;
    assert_eq!(report.attempts, 1);
    assert_eq!(e.plan(&key()).unwrap().stage, ExitStage::Profit);
}

#[tokio::test]
async fn test_cadence_respected_within_stage() {
    let submitter = RecordingSubmitter::default();
    let mut e = engine(submitter.clone());

    e.run_cycle(&[position_at(dec!(56))], T0).await;
    // 5-second cycles: only every third one clears the 15-second cadence.
    for i in 1..=6u64 {
        e.run_cycle(&[position_at(dec!(56))], T0 + i * 5_000).await;
    }
    assert_eq!(submitter.orders.lock().len(), 3);
}
