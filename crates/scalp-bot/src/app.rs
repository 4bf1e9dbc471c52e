//! Main application orchestration.
//!
//! Drives the exit engine on a fixed cadence. One full engine pass per
//! tick; ticks never overlap. The interval skips missed ticks and a
//! single-flight guard rejects re-entry, so a slow pass drops cycles
//! instead of queueing double-submissions behind itself.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::paper::{PaperPortfolio, PaperSubmitter};
use scalp_exit::ExitEngine;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    portfolio: PaperPortfolio,
    engine: Mutex<ExitEngine<PaperPortfolio, PaperSubmitter>>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let portfolio = PaperPortfolio::new(&config.paper);
        let submitter = PaperSubmitter::new(config.paper.fill);
        let engine = ExitEngine::new(config.engine.clone(), portfolio.clone(), submitter)?;

        Ok(Self {
            config,
            portfolio,
            engine: Mutex::new(engine),
        })
    }

    /// Run the cycle loop until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        info!(
            cycle_interval_ms = self.config.cycle_interval_ms,
            seed_positions = self.config.paper.positions.len(),
            "Starting exit bot"
        );

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.cycle_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_one_cycle().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn run_one_cycle(&self) {
        // Single-flight: a pass still holding the engine means this tick
        // arrived early; drop it rather than queue behind it.
        let Ok(mut engine) = self.engine.try_lock() else {
            warn!("Previous cycle still running, tick skipped");
            return;
        };

        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let positions = self.portfolio.snapshot(now_ms);
        let report = engine.run_cycle(&positions, now_ms).await;

        if report.attempts > 0 || report.fills > 0 || report.abandoned > 0 {
            info!(
                positions = report.evaluated,
                attempts = report.attempts,
                fills = report.fills,
                abandoned = report.abandoned,
                plans_open = report.plans_open,
                "Cycle report"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::PaperPositionConfig;
    use rust_decimal_macros::dec;

    fn config_with_seed() -> AppConfig {
        let mut config = AppConfig::default();
        config.paper.positions.push(PaperPositionConfig {
            market: "0xabc".into(),
            token: "1".into(),
            shares: dec!(100),
            avg_entry_cents: dec!(50),
            bid_cents: Some(dec!(56)),
            ask_cents: Some(dec!(58)),
            bid_depth: dec!(500),
            held_minutes: 10,
        });
        config
    }

    #[tokio::test]
    async fn test_cycle_exits_ripe_paper_position() {
        let app = Application::new(config_with_seed()).unwrap();

        app.run_one_cycle().await;
        // 12% profit past min hold: exited on the first pass.
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        assert!(app.portfolio.snapshot(now_ms).is_empty());
    }

    #[tokio::test]
    async fn test_rejecting_submitter_keeps_position() {
        let mut config = config_with_seed();
        config.paper.fill = false;
        let app = Application::new(config).unwrap();

        app.run_one_cycle().await;
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        assert_eq!(app.portfolio.snapshot(now_ms).len(), 1);
        assert_eq!(app.engine.lock().await.open_plans(), 1);
    }
}
