use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::calibration::array_file::MissingReflectancePolicy;
use crate::calibration::profile::Sensor;

pub const DEFAULT_CALIBRATION_ROOT: &str = "/home/extractor/calibration_new";
pub const DEFAULT_MEMORY_RESERVE_BYTES: u64 = 5 * 1024 * 1024;

/// One calibration run: a raw cube, when it was taken and where its outputs go.
#[derive(Debug, Clone)]
pub struct CalibrationJob {
    pub raw_path: PathBuf,
    pub sensor: Sensor,
    pub data_date: NaiveDate,
    /// ISO 8601 acquisition timestamp; only its time of day is matched
    pub timestamp: String,
    pub environment_logger: PathBuf,
    /// NetCDF file produced by the imaging workflow
    pub template: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStage {
    ResolveProfile,
    LoadRaw,
    NoCalibrationPath,
    CalibrationPath,
    Rewrite,
    Done,
}

impl CalibrationStage {
    pub fn name(&self) -> &'static str {
        match self {
            CalibrationStage::ResolveProfile => "resolve_profile",
            CalibrationStage::LoadRaw => "load_raw",
            CalibrationStage::NoCalibrationPath => "no_calibration_path",
            CalibrationStage::CalibrationPath => "calibration_path",
            CalibrationStage::Rewrite => "rewrite",
            CalibrationStage::Done => "done",
        }
    }
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub calibration_root: PathBuf,
    pub missing_reflectance: MissingReflectancePolicy,
    /// Fail the run when the reflectance holds NaN or infinite values
    pub validate_finite: bool,
    pub memory_reserve_bytes: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            calibration_root: PathBuf::from(DEFAULT_CALIBRATION_ROOT),
            missing_reflectance: MissingReflectancePolicy::default(),
            validate_finite: false,
            memory_reserve_bytes: DEFAULT_MEMORY_RESERVE_BYTES,
        }
    }
}

impl CalibrationConfig {
    pub fn builder() -> CalibrationConfigBuilder {
        CalibrationConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct CalibrationConfigBuilder {
    calibration_root: Option<PathBuf>,
    missing_reflectance: Option<MissingReflectancePolicy>,
    validate_finite: Option<bool>,
    memory_reserve_bytes: Option<u64>,
}

impl CalibrationConfigBuilder {
    pub fn calibration_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.calibration_root = Some(root.into());
        self
    }

    pub fn missing_reflectance(mut self, policy: MissingReflectancePolicy) -> Self {
        self.missing_reflectance = Some(policy);
        self
    }

    pub fn validate_finite(mut self, validate: bool) -> Self {
        self.validate_finite = Some(validate);
        self
    }

    pub fn memory_reserve_bytes(mut self, bytes: u64) -> Self {
        self.memory_reserve_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> CalibrationConfig {
        let default = CalibrationConfig::default();
        CalibrationConfig {
            calibration_root: self.calibration_root.unwrap_or(default.calibration_root),
            missing_reflectance: self.missing_reflectance.unwrap_or(default.missing_reflectance),
            validate_finite: self.validate_finite.unwrap_or(default.validate_finite),
            memory_reserve_bytes: self.memory_reserve_bytes.unwrap_or(default.memory_reserve_bytes),
        }
    }
}
