//! Core domain types for the prediction-market scalp exit bot.
//!
//! This crate provides fundamental types used throughout the system:
//! - `InstrumentKey`: Unique identifier for an outcome token within a market
//! - `Cents`, `Shares`: Precision-safe numeric types
//! - `Position`, `Quote`: Read-only per-cycle market/position snapshots
//! - `ExitOrder`, `SubmitOutcome`: Order submission request/result types

pub mod decimal;
pub mod error;
pub mod instrument;
pub mod order;
pub mod position;

pub use decimal::{Cents, Shares};
pub use error::{CoreError, Result};
pub use instrument::InstrumentKey;
pub use order::{ClientOrderId, ExitOrder, OrderSide, SubmitOutcome, SubmitStatus};
pub use position::{Position, Quote};
