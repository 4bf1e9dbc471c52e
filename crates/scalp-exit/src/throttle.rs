//! Diagnostic rate limiting.
//!
//! Repeating conditions (held below target, deferred on liquidity, breaker
//! still open) would otherwise emit an identical line every cycle. The
//! throttle keys on instrument + event kind so distinct conditions never
//! suppress each other. Observability only; nothing reads it for decisions.

use scalp_core::InstrumentKey;
use std::collections::{HashMap, HashSet};

/// Per-(instrument, event-kind) minimum interval between log lines.
#[derive(Debug)]
pub struct LogThrottle {
    last: HashMap<(InstrumentKey, &'static str), u64>,
    interval_ms: u64,
}

impl LogThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            last: HashMap::new(),
            interval_ms,
        }
    }

    /// Should this event be logged now? Records the emission when yes.
    pub fn allow(&mut self, instrument: &InstrumentKey, kind: &'static str, now_ms: u64) -> bool {
        let key = (instrument.clone(), kind);
        match self.last.get(&key) {
            Some(&last) if now_ms.saturating_sub(last) < self.interval_ms => false,
            _ => {
                self.last.insert(key, now_ms);
                true
            }
        }
    }

    /// Drop state for instruments no longer held.
    pub fn retain(&mut self, live: &HashSet<InstrumentKey>) {
        self.last.retain(|(key, _), _| live.contains(key));
    }
}
