//! Paper-trading collaborators.
//!
//! Stand-ins for the live portfolio and order-submission services, driven
//! from configuration. Positions are seeded from TOML; a submitted exit
//! removes its position, so a dry run exercises the whole ladder without
//! touching an exchange.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use scalp_core::{Cents, ExitOrder, InstrumentKey, OrderSide, Position, Quote, Shares, SubmitOutcome};
use scalp_exit::{ExitResult, OrderSubmitter, PortfolioView};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Paper-trading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Whether paper orders fill. Default: true.
    #[serde(default = "default_fill")]
    pub fill: bool,

    /// Seed positions.
    #[serde(default)]
    pub positions: Vec<PaperPositionConfig>,
}

fn default_fill() -> bool {
    true
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            fill: default_fill(),
            positions: Vec::new(),
        }
    }
}

/// One seeded paper position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPositionConfig {
    pub market: String,
    pub token: String,
    pub shares: Decimal,
    pub avg_entry_cents: Decimal,
    pub bid_cents: Option<Decimal>,
    pub ask_cents: Option<Decimal>,
    #[serde(default)]
    pub bid_depth: Decimal,
    /// Hold duration already accrued when the bot starts (minutes).
    #[serde(default)]
    pub held_minutes: u64,
}

#[derive(Debug)]
struct PaperBook {
    seeds: Vec<PaperPositionConfig>,
    /// First snapshot time; hold durations accrue from here.
    opened_at_ms: Option<u64>,
    /// Instruments whose exits filled.
    exited: HashSet<InstrumentKey>,
}

/// Shared-state paper portfolio. Clones share one book, so the engine's
/// handle and the scheduler's handle observe the same fills.
#[derive(Debug, Clone)]
pub struct PaperPortfolio {
    inner: Arc<Mutex<PaperBook>>,
}

impl PaperPortfolio {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PaperBook {
                seeds: config.positions.clone(),
                opened_at_ms: None,
                exited: HashSet::new(),
            })),
        }
    }

    /// Per-cycle position snapshot.
    pub fn snapshot(&self, now_ms: u64) -> Vec<Position> {
        let mut book = self.inner.lock();
        let opened = *book.opened_at_ms.get_or_insert(now_ms);

        book.seeds
            .iter()
            .filter_map(|seed| {
                let instrument = InstrumentKey::new(&seed.market, &seed.token);
                if book.exited.contains(&instrument) {
                    return None;
                }
                let entry = Cents::new(seed.avg_entry_cents);
                let bid = seed.bid_cents.map(Cents::new);
                let pnl_pct = bid
                    .and_then(|b| b.pct_from(entry))
                    .unwrap_or(Decimal::ZERO);
                let shares = Shares::new(seed.shares);
                let pnl_usd = bid
                    .map(|b| shares.notional_usd(b) - shares.notional_usd(entry))
                    .unwrap_or(Decimal::ZERO);

                Some(Position {
                    instrument,
                    side: OrderSide::Buy,
                    shares,
                    avg_entry: entry,
                    quote: Quote::new(
                        bid,
                        seed.ask_cents.map(Cents::new),
                        Shares::new(seed.bid_depth),
                    ),
                    pnl_pct,
                    pnl_usd,
                    held_ms: seed.held_minutes * 60_000 + now_ms.saturating_sub(opened),
                    price_trusted: true,
                    entry_trusted: true,
                    redeemable: false,
                    tradable: true,
                })
            })
            .collect()
    }
}

impl PortfolioView for PaperPortfolio {
    async fn invalidate_cache(&self, instrument: &InstrumentKey) {
        let mut book = self.inner.lock();
        book.exited.insert(instrument.clone());
        info!(instrument = %instrument, "Paper position exited");
    }

    async fn entry_time_ms(&self, instrument: &InstrumentKey) -> Option<u64> {
        let book = self.inner.lock();
        let opened = book.opened_at_ms?;
        book.seeds
            .iter()
            .find(|s| InstrumentKey::new(&s.market, &s.token) == *instrument)
            .map(|s| opened.saturating_sub(s.held_minutes * 60_000))
    }
}

/// Order submitter that fills (or rejects) everything.
#[derive(Debug, Clone)]
pub struct PaperSubmitter {
    fill: bool,
}

impl PaperSubmitter {
    pub fn new(fill: bool) -> Self {
        Self { fill }
    }
}

impl OrderSubmitter for PaperSubmitter {
    async fn submit(&self, order: &ExitOrder) -> ExitResult<SubmitOutcome> {
        info!(
            cloid = %order.cloid,
            instrument = %order.instrument,
            shares = %order.shares,
            limit = %order.limit_price,
            notional = %order.notional_usd,
            fill = self.fill,
            "Paper order"
        );
        if self.fill {
            Ok(SubmitOutcome::submitted())
        } else {
            Ok(SubmitOutcome::failed("paper rejection"))
        }
    }
}
