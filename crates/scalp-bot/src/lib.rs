//! Prediction-market position exit bot.
//!
//! Wires the exit engine to a scheduler and collaborators:
//! - Periodic cycle driver with a single-flight guard
//! - TOML configuration loading
//! - Structured logging initialization
//! - Paper-trading collaborators for dry runs

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod paper;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
