//! Calibration orchestration module
//!
//! Sequences profile resolution, raw loading, reflectance computation and the
//! array file rewrite for one raw scan.

mod types;
mod timing;
mod orchestrator;


pub use types::{
    CalibrationConfig,
    CalibrationConfigBuilder,
    CalibrationJob,
    CalibrationStage,
    DEFAULT_CALIBRATION_ROOT,
    DEFAULT_MEMORY_RESERVE_BYTES,
};
pub use timing::{PipelineTimings, StepTiming, Timer};
pub use orchestrator::CalibrationPipeline;
