//! Exit engine configuration.
//!
//! Every threshold the engine recognizes lives here, grouped by the
//! component that consumes it. All fields carry serde defaults so a
//! partial TOML section deserializes into a runnable configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExitError, ExitResult};

// ============================================================================
// WindowConfig
// ============================================================================

/// Exit ladder timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Total exit window W (ms). PROFIT below 0.6W, BREAKEVEN below W,
    /// FORCE at and beyond W. Default: 30 minutes.
    #[serde(default = "default_exit_window_ms")]
    pub exit_window_ms: u64,

    /// Minimum interval between attempts within one stage (ms).
    /// The first attempt of a new stage is exempt. Default: 15 seconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Multiple of the window after which a FORCE-stage plan is abandoned
    /// regardless of fill status. Default: 2.0.
    #[serde(default = "default_force_abandon_multiple")]
    pub force_abandon_multiple: f64,
}

fn default_exit_window_ms() -> u64 {
    1_800_000
}

fn default_retry_interval_ms() -> u64 {
    15_000
}

fn default_force_abandon_multiple() -> f64 {
    2.0
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            exit_window_ms: default_exit_window_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            force_abandon_multiple: default_force_abandon_multiple(),
        }
    }
}

impl WindowConfig {
    /// Absolute deadline (ms after plan creation) for FORCE abandonment.
    pub fn abandon_deadline_ms(&self) -> u64 {
        (self.exit_window_ms as f64 * self.force_abandon_multiple) as u64
    }
}

// ============================================================================
// SizingConfig
// ============================================================================

/// Order sizing floors and the dust cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Exchange practical minimum order notional in USD. Default: $5.
    #[serde(default = "default_min_order_usd")]
    pub min_order_usd: Decimal,

    /// Suppression window after a dust abandonment (ms). Default: 10 minutes.
    #[serde(default = "default_dust_cooldown_ms")]
    pub dust_cooldown_ms: u64,
}

fn default_min_order_usd() -> Decimal {
    Decimal::from(5)
}

fn default_dust_cooldown_ms() -> u64 {
    600_000
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            min_order_usd: default_min_order_usd(),
            dust_cooldown_ms: default_dust_cooldown_ms(),
        }
    }
}

// ============================================================================
// QualityConfig
// ============================================================================

/// Order-book quality validation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Bid below this floor while the ask sits above the ceiling signals
    /// wrong-instrument data or cache corruption. Default: 5¢.
    #[serde(default = "default_low_sanity_floor_cents")]
    pub low_sanity_floor_cents: Decimal,

    /// See `low_sanity_floor_cents`. Default: 95¢.
    #[serde(default = "default_high_sanity_ceiling_cents")]
    pub high_sanity_ceiling_cents: Decimal,

    /// Maximum tolerated deviation between the executable bid and an
    /// independent reference price (cents). Default: 15¢.
    #[serde(default = "default_max_reference_deviation_cents")]
    pub max_reference_deviation_cents: Decimal,
}

fn default_low_sanity_floor_cents() -> Decimal {
    Decimal::from(5)
}

fn default_high_sanity_ceiling_cents() -> Decimal {
    Decimal::from(95)
}

fn default_max_reference_deviation_cents() -> Decimal {
    Decimal::from(15)
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            low_sanity_floor_cents: default_low_sanity_floor_cents(),
            high_sanity_ceiling_cents: default_high_sanity_ceiling_cents(),
            max_reference_deviation_cents: default_max_reference_deviation_cents(),
        }
    }
}

// ============================================================================
// IlliquidityConfig
// ============================================================================

/// Depth/spread adequacy thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IlliquidityConfig {
    /// Ask−bid spread beyond this is an illiquid book (cents). Default: 10¢.
    #[serde(default = "default_extreme_spread_cents")]
    pub extreme_spread_cents: Decimal,

    /// Bid at or below this is a "tiny bid" (cents). Default: 2¢.
    #[serde(default = "default_tiny_bid_floor_cents")]
    pub tiny_bid_floor_cents: Decimal,

    /// A tiny bid only counts when the target or minimum-acceptable price
    /// sits at or above this floor (cents). Default: 20¢.
    #[serde(default = "default_target_floor_cents")]
    pub target_floor_cents: Decimal,
}

fn default_extreme_spread_cents() -> Decimal {
    Decimal::from(10)
}

fn default_tiny_bid_floor_cents() -> Decimal {
    Decimal::from(2)
}

fn default_target_floor_cents() -> Decimal {
    Decimal::from(20)
}

impl Default for IlliquidityConfig {
    fn default() -> Self {
        Self {
            extreme_spread_cents: default_extreme_spread_cents(),
            tiny_bid_floor_cents: default_tiny_bid_floor_cents(),
            target_floor_cents: default_target_floor_cents(),
        }
    }
}

// ============================================================================
// BreakerConfig
// ============================================================================

/// Execution circuit breaker: escalating cooldowns after bad-data failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Cooldown ladder (ms). Failure N applies `ladder[min(N-1, last)]`.
    /// Default: 1m, 5m, 15m, 60m.
    #[serde(default = "default_cooldown_ladder_ms")]
    pub cooldown_ladder_ms: Vec<u64>,

    /// A failure within this window of the previous one escalates the
    /// counter; outside it the counter resets to 1. Default: 2 hours.
    #[serde(default = "default_escalation_window_ms")]
    pub escalation_window_ms: u64,
}

fn default_cooldown_ladder_ms() -> Vec<u64> {
    vec![60_000, 300_000, 900_000, 3_600_000]
}

fn default_escalation_window_ms() -> u64 {
    7_200_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            cooldown_ladder_ms: default_cooldown_ladder_ms(),
            escalation_window_ms: default_escalation_window_ms(),
        }
    }
}

// ============================================================================
// IlliquidBackoffConfig
// ============================================================================

/// Backoff for deferred plans waiting on liquidity to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IlliquidBackoffConfig {
    /// Recheck delays (ms), escalated per consecutive illiquid recheck and
    /// clamped at the last entry. Default: 1m, 5m, 15m.
    #[serde(default = "default_backoff_ladder_ms")]
    pub backoff_ladder_ms: Vec<u64>,

    /// Consecutive illiquid rechecks after which the plan is abandoned.
    /// Default: 10.
    #[serde(default = "default_max_rechecks")]
    pub max_rechecks: u32,
}

fn default_backoff_ladder_ms() -> Vec<u64> {
    vec![60_000, 300_000, 900_000]
}

fn default_max_rechecks() -> u32 {
    10
}

impl Default for IlliquidBackoffConfig {
    fn default() -> Self {
        Self {
            backoff_ladder_ms: default_backoff_ladder_ms(),
            max_rechecks: default_max_rechecks(),
        }
    }
}

// ============================================================================
// LegacyMetadataPolicy
// ============================================================================

/// How to treat positions whose entry metadata is untrusted.
///
/// `AllowAll` knowingly feeds untrusted hold durations into hold-time
/// gates; that limitation is accepted rather than silently corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyMetadataPolicy {
    /// Skip untrusted positions entirely.
    #[default]
    Skip,
    /// Evaluate untrusted positions with the P&L-only evaluator.
    ProfitOnlyBypass,
    /// Run the full evaluator despite untrusted metadata.
    AllowAll,
}

impl std::fmt::Display for LegacyMetadataPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::ProfitOnlyBypass => write!(f, "profit-only-bypass"),
            Self::AllowAll => write!(f, "allow-all"),
        }
    }
}

// ============================================================================
// EligibilityConfig
// ============================================================================

/// Thresholds for the start-exit-now decision (evaluator rules 1–9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Minimum profit percent required before any normal exit. Default: 5%.
    #[serde(default = "default_min_profit_pct")]
    pub min_profit_pct: Decimal,

    /// Target profit percent; reaching it exits immediately. Default: 10%.
    #[serde(default = "default_target_profit_pct")]
    pub target_profit_pct: Decimal,

    /// Minimum absolute profit in USD. Default: $1.
    #[serde(default = "default_min_profit_usd")]
    pub min_profit_usd: Decimal,

    /// Minimum hold time before a normal exit (ms). Default: 5 minutes.
    #[serde(default = "default_min_hold_ms")]
    pub min_hold_ms: u64,

    /// Maximum hold time; beyond it capital is released (ms).
    /// Default: 90 minutes.
    #[serde(default = "default_max_hold_ms")]
    pub max_hold_ms: u64,

    /// Number of recent price samples fed to the momentum regression.
    /// Default: 5.
    #[serde(default = "default_momentum_ticks")]
    pub momentum_ticks: usize,

    /// Regression slope (cents per sample) at or below which momentum has
    /// faded. Default: 0.
    #[serde(default = "default_slope_threshold")]
    pub slope_threshold: Decimal,

    /// Spread widening since first observation that signals fade (cents).
    /// Default: 3¢.
    #[serde(default = "default_spread_widen_cents")]
    pub spread_widen_cents: Decimal,

    /// Bid depth below this fraction of its first-observed value signals
    /// fade. Default: 0.25.
    #[serde(default = "default_depth_thin_fraction")]
    pub depth_thin_fraction: Decimal,

    /// Resolution-exclusion entry ceiling (cents). Default: 60¢.
    #[serde(default = "default_resolution_entry_ceiling_cents")]
    pub resolution_entry_ceiling_cents: Decimal,

    /// Resolution-exclusion current-price floor (cents). Default: 90¢.
    #[serde(default = "default_resolution_price_floor_cents")]
    pub resolution_price_floor_cents: Decimal,

    /// Sudden-spike trigger: price move percent within the spike window.
    /// Default: 15%.
    #[serde(default = "default_spike_pct")]
    pub spike_pct: Decimal,

    /// Sudden-spike lookback window (ms). Default: 2 minutes.
    #[serde(default = "default_spike_window_ms")]
    pub spike_window_ms: u64,

    /// Extreme-profit ceiling; P&L% at or above max(3×target, this) exits
    /// immediately. Default: 25%.
    #[serde(default = "default_extreme_profit_ceiling_pct")]
    pub extreme_profit_ceiling_pct: Decimal,

    /// Low-price volatile mode: entries at or below this price (cents) use
    /// rule 1. Zero disables the mode. Default: 0 (disabled).
    #[serde(default)]
    pub low_price_entry_cents: Decimal,

    /// Low-price mode maximum hold (ms). Default: 30 minutes.
    #[serde(default = "default_low_price_max_hold_ms")]
    pub low_price_max_hold_ms: u64,

    /// Low-price mode tolerated loss magnitude in percent (must stay
    /// below 10). Default: 5%.
    #[serde(default = "default_low_price_max_loss_pct")]
    pub low_price_max_loss_pct: Decimal,

    /// Policy for positions with untrusted entry metadata.
    #[serde(default)]
    pub legacy_policy: LegacyMetadataPolicy,
}

fn default_min_profit_pct() -> Decimal {
    Decimal::from(5)
}

fn default_target_profit_pct() -> Decimal {
    Decimal::from(10)
}

fn default_min_profit_usd() -> Decimal {
    Decimal::ONE
}

fn default_min_hold_ms() -> u64 {
    300_000
}

fn default_max_hold_ms() -> u64 {
    5_400_000
}

fn default_momentum_ticks() -> usize {
    5
}

fn default_slope_threshold() -> Decimal {
    Decimal::ZERO
}

fn default_spread_widen_cents() -> Decimal {
    Decimal::from(3)
}

fn default_depth_thin_fraction() -> Decimal {
    Decimal::new(25, 2)
}

fn default_resolution_entry_ceiling_cents() -> Decimal {
    Decimal::from(60)
}

fn default_resolution_price_floor_cents() -> Decimal {
    Decimal::from(90)
}

fn default_spike_pct() -> Decimal {
    Decimal::from(15)
}

fn default_spike_window_ms() -> u64 {
    120_000
}

fn default_extreme_profit_ceiling_pct() -> Decimal {
    Decimal::from(25)
}

fn default_low_price_max_hold_ms() -> u64 {
    1_800_000
}

fn default_low_price_max_loss_pct() -> Decimal {
    Decimal::from(5)
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: default_min_profit_pct(),
            target_profit_pct: default_target_profit_pct(),
            min_profit_usd: default_min_profit_usd(),
            min_hold_ms: default_min_hold_ms(),
            max_hold_ms: default_max_hold_ms(),
            momentum_ticks: default_momentum_ticks(),
            slope_threshold: default_slope_threshold(),
            spread_widen_cents: default_spread_widen_cents(),
            depth_thin_fraction: default_depth_thin_fraction(),
            resolution_entry_ceiling_cents: default_resolution_entry_ceiling_cents(),
            resolution_price_floor_cents: default_resolution_price_floor_cents(),
            spike_pct: default_spike_pct(),
            spike_window_ms: default_spike_window_ms(),
            extreme_profit_ceiling_pct: default_extreme_profit_ceiling_pct(),
            low_price_entry_cents: Decimal::ZERO,
            low_price_max_hold_ms: default_low_price_max_hold_ms(),
            low_price_max_loss_pct: default_low_price_max_loss_pct(),
            legacy_policy: LegacyMetadataPolicy::default(),
        }
    }
}

// ============================================================================
// ExitEngineConfig
// ============================================================================

/// Top-level configuration for the exit engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitEngineConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub illiquidity: IlliquidityConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub illiquid_backoff: IlliquidBackoffConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,

    /// Rolling history depth per instrument (samples). Default: 20.
    #[serde(default = "default_history_samples")]
    pub history_samples: usize,

    /// Minimum interval between repeated diagnostics for the same
    /// instrument and event kind (ms). Default: 60 seconds.
    #[serde(default = "default_diag_throttle_ms")]
    pub diag_throttle_ms: u64,
}

fn default_history_samples() -> usize {
    20
}

fn default_diag_throttle_ms() -> u64 {
    60_000
}

impl Default for ExitEngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            sizing: SizingConfig::default(),
            quality: QualityConfig::default(),
            illiquidity: IlliquidityConfig::default(),
            breaker: BreakerConfig::default(),
            illiquid_backoff: IlliquidBackoffConfig::default(),
            eligibility: EligibilityConfig::default(),
            history_samples: default_history_samples(),
            diag_throttle_ms: default_diag_throttle_ms(),
        }
    }
}

impl ExitEngineConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> ExitResult<()> {
        if self.window.exit_window_ms == 0 {
            return Err(ExitError::InvalidConfig(
                "exit_window_ms must be positive".into(),
            ));
        }
        if self.window.force_abandon_multiple < 1.0 {
            return Err(ExitError::InvalidConfig(
                "force_abandon_multiple must be >= 1".into(),
            ));
        }
        if self.breaker.cooldown_ladder_ms.is_empty() {
            return Err(ExitError::InvalidConfig(
                "breaker cooldown ladder must not be empty".into(),
            ));
        }
        if self.illiquid_backoff.backoff_ladder_ms.is_empty() {
            return Err(ExitError::InvalidConfig(
                "illiquid backoff ladder must not be empty".into(),
            ));
        }
        if self.illiquid_backoff.max_rechecks == 0 {
            return Err(ExitError::InvalidConfig(
                "max_rechecks must be positive".into(),
            ));
        }
        if self.eligibility.min_hold_ms > self.eligibility.max_hold_ms {
            return Err(ExitError::InvalidConfig(
                "min_hold_ms exceeds max_hold_ms".into(),
            ));
        }
        if self.eligibility.low_price_max_loss_pct >= Decimal::from(10) {
            return Err(ExitError::InvalidConfig(
                "low_price_max_loss_pct must stay below 10".into(),
            ));
        }
        if self.history_samples == 0 {
            return Err(ExitError::InvalidConfig(
                "history_samples must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_validate() {
        let config = ExitEngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.exit_window_ms, 1_800_000);
        assert_eq!(config.breaker.cooldown_ladder_ms.len(), 4);
        assert_eq!(config.illiquid_backoff.max_rechecks, 10);
        // Default impl must agree with the serde defaults.
        assert_eq!(config.history_samples, 20);
        assert_eq!(config.diag_throttle_ms, 60_000);
    }

    #[test]
    fn test_abandon_deadline() {
        let window = WindowConfig::default();
        assert_eq!(window.abandon_deadline_ms(), 3_600_000);
    }

    #[test]
    fn test_low_price_loss_bound_enforced() {
        let mut config = ExitEngineConfig::default();
        config.eligibility.low_price_max_loss_pct = dec!(12);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_src = r#"
            [window]
            exit_window_ms = 60000

            [eligibility]
            legacy_policy = "profit-only-bypass"
        "#;
        let config: ExitEngineConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.window.exit_window_ms, 60_000);
        assert_eq!(config.window.retry_interval_ms, 15_000);
        assert_eq!(
            config.eligibility.legacy_policy,
            LegacyMetadataPolicy::ProfitOnlyBypass
        );
        assert_eq!(config.sizing.min_order_usd, dec!(5));
    }

    #[test]
    fn test_empty_ladder_rejected() {
        let mut config = ExitEngineConfig::default();
        config.breaker.cooldown_ladder_ms.clear();
        assert!(config.validate().is_err());
    }
}
