use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

use crate::calibration::pipeline::types::CalibrationStage;

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub stage: CalibrationStage,
    pub duration: Duration,
}

/// Wall-clock time spent in each stage of one calibration run.
#[derive(Debug, Default)]
pub struct PipelineTimings {
    steps: Vec<StepTiming>,
    by_stage: HashMap<&'static str, Duration>,
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, stage: CalibrationStage, duration: Duration) {
        self.steps.push(StepTiming { stage, duration });
        *self.by_stage.entry(stage.name()).or_insert(Duration::ZERO) += duration;
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    pub fn get_step(&self, stage: CalibrationStage) -> Option<Duration> {
        self.by_stage.get(stage.name()).copied()
    }

    pub fn steps(&self) -> &[StepTiming] {
        &self.steps
    }

    pub fn log_summary(&self) {
        let total = self.total_duration().as_secs_f64();
        for step in &self.steps {
            let share = if total > 0.0 {
                step.duration.as_secs_f64() / total * 100.0
            } else {
                0.0
            };
            info!(
                "{:<20} {:>12.3}ms ({:>5.1}%)",
                step.stage.name(),
                step.duration.as_secs_f64() * 1000.0,
                share
            );
        }
        info!("{:<20} {:>12.3}ms", "total", total * 1000.0);
    }
}

pub struct Timer {
    start: Instant,
    stage: CalibrationStage,
}

impl Timer {
    pub fn start(stage: CalibrationStage) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    pub fn stop(self) -> (CalibrationStage, Duration) {
        (self.stage, self.start.elapsed())
    }
}
