//! Staged liquidation engine for profitable prediction-market positions.
//!
//! The exit subsystem reconciles a continuously re-evaluated business
//! decision ("exit now?") with a persistent, multi-cycle execution state
//! machine whose timing is independent of that decision.
//!
//! Components (leaf-first):
//! - `quality`: pure classifier of order-book health
//! - `illiquidity`: pure classifier of depth/spread adequacy
//! - `breaker`: per-instrument cooldown registry with escalation
//! - `dust`: per-instrument suppression after sub-minimum exits
//! - `plan`: the per-instrument exit ladder state machine
//! - `evaluator`: position + signals → start-exit-now / not-yet
//! - `history`: bounded rolling price/depth samples for momentum
//! - `engine`: per-cycle orchestrator tying the above together

pub mod breaker;
pub mod config;
pub mod dust;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod illiquidity;
pub mod plan;
pub mod quality;
pub mod throttle;

pub use breaker::{BreakerEntry, ExecutionCircuitBreaker};
pub use config::{
    BreakerConfig, EligibilityConfig, ExitEngineConfig, IlliquidBackoffConfig, IlliquidityConfig,
    LegacyMetadataPolicy, QualityConfig, SizingConfig, WindowConfig,
};
pub use dust::DustCooldownRegistry;
pub use engine::{CycleReport, ExitEngine, OrderSubmitter, PortfolioView, SkipReason};
pub use error::{ExitError, ExitResult};
pub use evaluator::{
    EligibilityEvaluator, ExitDecision, ExitReason, HoldReason, PnlOnlyEvaluator, ScalpEvaluator,
};
pub use history::{MomentumSnapshot, PriceHistory};
pub use illiquidity::{IlliquidityDetector, IlliquidityVerdict};
pub use plan::{BlockedReason, ExitPlan, ExitStage, PlanOutcome};
pub use quality::{OrderbookQualityValidator, QualityVerdict};
pub use throttle::LogThrottle;
