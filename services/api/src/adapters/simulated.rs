//! services/api/src/adapters/simulated.rs
//!
//! This module contains the stage executor used while no real research backend
//! exists. It implements the `StageExecutor` port by sleeping for each stage's fixed
//! duration and, while searching, announcing a scripted series of source counts.

use async_trait::async_trait;
use research_assistant_core::domain::Stage;
use research_assistant_core::ports::{
    PortResult, ProgressEvent, ProgressReporter, StageExecutor,
};
use research_assistant_core::report::{SOURCE_COUNT_INTERVAL_MS, SOURCE_COUNT_STEPS};
use std::time::Duration;
use tracing::debug;

/// An executor that waits instead of working.
#[derive(Clone, Debug)]
pub struct SimulatedStageExecutor {
    scale: f64,
}

impl SimulatedStageExecutor {
    /// Creates an executor whose delays are multiplied by `scale`.
    pub fn new(scale: f64) -> Self {
        Self {
            scale: scale.max(0.0),
        }
    }

    fn scaled(&self, ms: u64) -> Duration {
        Duration::from_millis((ms as f64 * self.scale).round() as u64)
    }

    async fn pause(&self, ms: u64) {
        let delay = self.scaled(ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for SimulatedStageExecutor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl StageExecutor for SimulatedStageExecutor {
    async fn execute(&self, stage: Stage, progress: &dyn ProgressReporter) -> PortResult<()> {
        debug!("Simulating stage {} for {}ms.", stage, stage.simulated_duration_ms());
        self.pause(stage.simulated_duration_ms()).await;

        if stage == Stage::Searching {
            for count in SOURCE_COUNT_STEPS {
                progress.report(ProgressEvent::SourcesFound { count });
                self.pause(SOURCE_COUNT_INTERVAL_MS).await;
            }
        }
        Ok(())
    }
}
