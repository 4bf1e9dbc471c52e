//! Dust cooldown registry.
//!
//! When a planned exit's notional falls under the exchange minimum, the
//! plan is abandoned and the instrument is suppressed for a fixed window so
//! the next cycles do not immediately recreate a doomed plan. After expiry
//! the position is re-evaluated normally.

use std::collections::{HashMap, HashSet};

use scalp_core::InstrumentKey;
use tracing::debug;

/// Per-instrument suppression after sub-minimum exit attempts.
#[derive(Debug)]
pub struct DustCooldownRegistry {
    /// Cooldown expiry per instrument (Unix ms).
    cooldowns: HashMap<InstrumentKey, u64>,
    duration_ms: u64,
}

impl DustCooldownRegistry {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            cooldowns: HashMap::new(),
            duration_ms,
        }
    }

    /// Arm the cooldown for an instrument whose exit abandoned as dust.
    pub fn arm(&mut self, instrument: &InstrumentKey, now_ms: u64) {
        let until = now_ms + self.duration_ms;
        self.cooldowns.insert(instrument.clone(), until);
        debug!(
            instrument = %instrument,
            until_ms = until,
            "Dust cooldown armed"
        );
    }

    /// Is plan creation currently suppressed for this instrument?
    pub fn is_suppressed(&self, instrument: &InstrumentKey, now_ms: u64) -> bool {
        self.cooldowns
            .get(instrument)
            .map(|&until| now_ms < until)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cooldowns.is_empty()
    }

    /// Drop expired cooldowns and cooldowns for instruments no longer held.
    pub fn gc(&mut self, live: &HashSet<InstrumentKey>, now_ms: u64) {
        self.cooldowns
            .retain(|key, &mut until| live.contains(key) && now_ms < until);
    }
}
