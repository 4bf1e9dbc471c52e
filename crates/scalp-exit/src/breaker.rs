//! Execution circuit breaker.
//!
//! Per-instrument cooldown registry with escalation. Repeated order-book
//! quality failures for the same instrument escalate through a cooldown
//! ladder instead of generating order spam; a passing check or garbage
//! collection clears the entry.
//!
//! The registry is a plain field of the engine, never a module-level
//! singleton, so independent engine instances (and tests) cannot interfere.

use std::collections::{HashMap, HashSet};

use scalp_core::{Cents, InstrumentKey};
use tracing::{debug, warn};

use crate::config::BreakerConfig;
use crate::quality::QualityVerdict;

/// Per-instrument breaker state.
#[derive(Debug, Clone)]
pub struct BreakerEntry {
    /// Attempts are suppressed until this timestamp (Unix ms).
    pub disabled_until_ms: u64,
    /// Consecutive failures inside the escalation window, capped at the
    /// ladder length.
    pub failure_count: u32,
    /// Timestamp of the most recent failure.
    pub last_failure_ms: u64,
    /// Label of the most recent failing verdict.
    pub last_reason: &'static str,
    /// Book snapshot at the most recent failure, for diagnostics.
    pub last_bid: Option<Cents>,
    pub last_ask: Option<Cents>,
}

/// Per-instrument cooldown registry with escalating durations.
#[derive(Debug)]
pub struct ExecutionCircuitBreaker {
    entries: HashMap<InstrumentKey, BreakerEntry>,
    config: BreakerConfig,
}

impl ExecutionCircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Record a quality failure and apply the ladder cooldown.
    ///
    /// A failure within the escalation window of the previous one bumps the
    /// capped counter; outside it the counter resets to 1. Returns the
    /// cooldown applied (ms).
    pub fn record_failure(
        &mut self,
        instrument: &InstrumentKey,
        verdict: &QualityVerdict,
        bid: Option<Cents>,
        ask: Option<Cents>,
        now_ms: u64,
    ) -> u64 {
        let ladder = &self.config.cooldown_ladder_ms;
        let cap = ladder.len() as u32;

        let count = match self.entries.get(instrument) {
            Some(prev)
                if now_ms.saturating_sub(prev.last_failure_ms)
                    <= self.config.escalation_window_ms =>
            {
                (prev.failure_count + 1).min(cap)
            }
            _ => 1,
        };

        let cooldown = ladder[(count as usize - 1).min(ladder.len() - 1)];
        self.entries.insert(
            instrument.clone(),
            BreakerEntry {
                disabled_until_ms: now_ms + cooldown,
                failure_count: count,
                last_failure_ms: now_ms,
                last_reason: verdict.label(),
                last_bid: bid,
                last_ask: ask,
            },
        );

        warn!(
            instrument = %instrument,
            reason = verdict.label(),
            failure_count = count,
            cooldown_ms = cooldown,
            bid = ?bid,
            ask = ?ask,
            "Circuit breaker tripped"
        );

        cooldown
    }

    /// Is the instrument currently suppressed?
    pub fn is_disabled(&self, instrument: &InstrumentKey, now_ms: u64) -> bool {
        self.entries
            .get(instrument)
            .map(|e| now_ms < e.disabled_until_ms)
            .unwrap_or(false)
    }

    /// Clear the entry after a passing check.
    pub fn clear(&mut self, instrument: &InstrumentKey) {
        if self.entries.remove(instrument).is_some() {
            debug!(instrument = %instrument, "Circuit breaker cleared");
        }
    }

    pub fn entry(&self, instrument: &InstrumentKey) -> Option<&BreakerEntry> {
        self.entries.get(instrument)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries for instruments no longer held, and lapsed entries whose
    /// cooldown expired with no failure inside the escalation window.
    pub fn gc(&mut self, live: &HashSet<InstrumentKey>, now_ms: u64) {
        let window = self.config.escalation_window_ms;
        self.entries.retain(|key, entry| {
            if !live.contains(key) {
                return false;
            }
            now_ms < entry.disabled_until_ms
                || now_ms.saturating_sub(entry.last_failure_ms) <= window
        });
    }
}
