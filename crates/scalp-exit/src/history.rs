//! Rolling price/depth history and momentum signals.
//!
//! The engine records one sample per instrument per cycle; the evaluator's
//! momentum rules read a `MomentumSnapshot` derived from the window. Spread
//! widening and depth thinning are measured against the FIRST observation
//! in the window, not the previous sample, so a slow bleed still registers.

use rust_decimal::Decimal;
use scalp_core::{Cents, InstrumentKey, Shares};
use std::collections::{HashMap, HashSet, VecDeque};

/// One top-of-book observation.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub at_ms: u64,
    pub bid: Cents,
    pub spread: Option<Cents>,
    pub bid_depth: Shares,
}

/// Momentum signals computed over the rolling window. `None` fields mean
/// the window is too shallow to judge; momentum rules must treat that as
/// "no signal", never as a fade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumSnapshot {
    /// Least-squares slope of the bid over the last N samples
    /// (cents per sample). Requires at least 2 samples.
    pub slope: Option<Decimal>,
    /// Percent move of the bid from the oldest sample inside the spike
    /// lookback window to the newest.
    pub move_pct_in_window: Option<Decimal>,
    /// Spread change versus the first observation (positive = widened).
    pub spread_delta: Option<Cents>,
    /// Current bid depth as a fraction of the first-observed depth.
    pub depth_fraction: Option<Decimal>,
}

/// Bounded per-instrument sample ring.
#[derive(Debug)]
pub struct PriceHistory {
    samples: HashMap<InstrumentKey, VecDeque<Sample>>,
    max_samples: usize,
}

impl PriceHistory {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: HashMap::new(),
            max_samples: max_samples.max(1),
        }
    }

    /// Record one observation. Cycles without an executable bid are not
    /// recorded; a gap is better signal than a fabricated zero.
    pub fn record(
        &mut self,
        instrument: &InstrumentKey,
        bid: Cents,
        spread: Option<Cents>,
        bid_depth: Shares,
        now_ms: u64,
    ) {
        let ring = self.samples.entry(instrument.clone()).or_default();
        if ring.len() == self.max_samples {
            ring.pop_front();
        }
        ring.push_back(Sample {
            at_ms: now_ms,
            bid,
            spread,
            bid_depth,
        });
    }

    pub fn sample_count(&self, instrument: &InstrumentKey) -> usize {
        self.samples.get(instrument).map(|r| r.len()).unwrap_or(0)
    }

    /// Compute the momentum snapshot for one instrument.
    ///
    /// - `momentum_ticks` bounds the regression window
    /// - `spike_window_ms` bounds the lookback for the percent move
    pub fn momentum(
        &self,
        instrument: &InstrumentKey,
        momentum_ticks: usize,
        spike_window_ms: u64,
        now_ms: u64,
    ) -> MomentumSnapshot {
        let ring = match self.samples.get(instrument) {
            Some(r) if !r.is_empty() => r,
            _ => return MomentumSnapshot::default(),
        };

        let newest = ring.back().copied().unwrap_or_else(|| ring[0]);
        let first = ring[0];

        let slope = {
            let start = ring.len().saturating_sub(momentum_ticks.max(2));
            let window: Vec<Decimal> = ring.iter().skip(start).map(|s| s.bid.inner()).collect();
            regression_slope(&window)
        };

        let move_pct_in_window = ring
            .iter()
            .find(|s| now_ms.saturating_sub(s.at_ms) <= spike_window_ms)
            .filter(|oldest| oldest.at_ms < newest.at_ms)
            .and_then(|oldest| newest.bid.pct_from(oldest.bid));

        let spread_delta = match (first.spread, newest.spread) {
            (Some(then), Some(cur)) => Some(cur - then),
            _ => None,
        };

        let depth_fraction = if first.bid_depth.is_positive() {
            Some(newest.bid_depth.inner() / first.bid_depth.inner())
        } else {
            None
        };

        MomentumSnapshot {
            slope,
            move_pct_in_window,
            spread_delta,
            depth_fraction,
        }
    }

    /// Drop history for instruments no longer held.
    pub fn retain(&mut self, live: &HashSet<InstrumentKey>) {
        self.samples.retain(|key, _| live.contains(key));
    }
}

/// Least-squares slope over equally-spaced samples. None below 2 points.
fn regression_slope(values: &[Decimal]) -> Option<Decimal> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_dec = Decimal::from(n as u64);
    let mean_x = Decimal::from((n - 1) as u64) / Decimal::TWO;
    let mean_y = values.iter().copied().sum::<Decimal>() / n_dec;

    let mut num = Decimal::ZERO;
    let mut den = Decimal::ZERO;
    for (i, y) in values.iter().enumerate() {
        let dx = Decimal::from(i as u64) - mean_x;
        num += dx * (*y - mean_y);
        den += dx * dx;
    }
    if den.is_zero() {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> InstrumentKey {
        InstrumentKey::new("0xmkt", "1")
    }

    fn cents(v: Decimal) -> Cents {
        Cents::new(v)
    }

    #[test]
    fn test_regression_slope_rising() {
        let slope = regression_slope(&[dec!(50), dec!(51), dec!(52), dec!(53)]).unwrap();
        assert_eq!(slope, dec!(1));
    }

    #[test]
    fn test_regression_slope_flat() {
        let slope = regression_slope(&[dec!(50), dec!(50), dec!(50)]).unwrap();
        assert_eq!(slope, dec!(0));
    }

    #[test]
    fn test_regression_slope_needs_two_points() {
        assert!(regression_slope(&[dec!(50)]).is_none());
        assert!(regression_slope(&[]).is_none());
    }

    #[test]
    fn test_ring_bounded() {
        let mut h = PriceHistory::new(3);
        let k = key();
        for i in 0..10u64 {
            h.record(&k, cents(Decimal::from(40 + i)), None, Shares::ONE, i * 1_000);
        }
        assert_eq!(h.sample_count(&k), 3);
    }

    #[test]
    fn test_empty_history_gives_no_signal() {
        let h = PriceHistory::new(20);
        let snap = h.momentum(&key(), 5, 120_000, 1_000_000);
        assert!(snap.slope.is_none());
        assert!(snap.move_pct_in_window.is_none());
        assert!(snap.spread_delta.is_none());
        assert!(snap.depth_fraction.is_none());
    }

    #[test]
    fn test_single_sample_gives_no_slope_or_move() {
        let mut h = PriceHistory::new(20);
        let k = key();
        h.record(&k, cents(dec!(50)), Some(cents(dec!(2))), Shares::ONE, 0);
        let snap = h.momentum(&k, 5, 120_000, 0);
        assert!(snap.slope.is_none());
        assert!(snap.move_pct_in_window.is_none());
    }

    #[test]
    fn test_spike_move_within_window() {
        let mut h = PriceHistory::new(20);
        let k = key();
        // Old sample outside the 2-minute window must not anchor the move.
        h.record(&k, cents(dec!(30)), None, Shares::ONE, 0);
        h.record(&k, cents(dec!(50)), None, Shares::ONE, 500_000);
        h.record(&k, cents(dec!(60)), None, Shares::ONE, 590_000);

        let snap = h.momentum(&k, 5, 120_000, 600_000);
        // Anchored at the 500_000 sample: (60-50)/50 = +20%
        assert_eq!(snap.move_pct_in_window, Some(dec!(20)));
    }

    #[test]
    fn test_spread_delta_vs_first_observation() {
        let mut h = PriceHistory::new(20);
        let k = key();
        h.record(&k, cents(dec!(50)), Some(cents(dec!(2))), Shares::ONE, 0);
        h.record(&k, cents(dec!(50)), Some(cents(dec!(3))), Shares::ONE, 1_000);
        h.record(&k, cents(dec!(50)), Some(cents(dec!(6))), Shares::ONE, 2_000);

        let snap = h.momentum(&k, 5, 120_000, 2_000);
        assert_eq!(snap.spread_delta, Some(cents(dec!(4))));
    }

    #[test]
    fn test_depth_fraction_vs_first_observation() {
        let mut h = PriceHistory::new(20);
        let k = key();
        h.record(&k, cents(dec!(50)), None, Shares::new(dec!(200)), 0);
        h.record(&k, cents(dec!(50)), None, Shares::new(dec!(40)), 1_000);

        let snap = h.momentum(&k, 5, 120_000, 1_000);
        assert_eq!(snap.depth_fraction, Some(dec!(0.2)));
    }

    #[test]
    fn test_slope_window_is_most_recent_ticks() {
        let mut h = PriceHistory::new(20);
        let k = key();
        // Long decline followed by a 3-tick rebound; a 3-tick window must
        // see the rebound.
        for (i, bid) in [60, 55, 50, 45, 44, 46, 48].iter().enumerate() {
            h.record(
                &k,
                cents(Decimal::from(*bid as u64)),
                None,
                Shares::ONE,
                i as u64 * 1_000,
            );
        }
        let snap = h.momentum(&k, 3, 120_000, 7_000);
        assert!(snap.slope.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn test_retain_drops_departed() {
        let mut h = PriceHistory::new(20);
        let held = key();
        let departed = InstrumentKey::new("0xmkt", "2");
        h.record(&held, cents(dec!(50)), None, Shares::ONE, 0);
        h.record(&departed, cents(dec!(50)), None, Shares::ONE, 0);

        let live: HashSet<_> = [held.clone()].into_iter().collect();
        h.retain(&live);
        assert_eq!(h.sample_count(&held), 1);
        assert_eq!(h.sample_count(&departed), 0);
    }
}
