use std::path::PathBuf;

use ndarray::Array1;
use tracing::debug;

use crate::calibration::coefficients::npy::read_npy;
use crate::calibration::coefficients::types::CalibrationCoefficients;
use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::profile::CameraGeneration;

const BAND_MATCH_FILE: &str = "best_matched_index.npy";
const BIAS_FILE: &str = "bias_coeff.npy";
const GAIN_FILE: &str = "gain_coeff.npy";

/// Source of calibration reference data, keyed by camera generation.
pub trait CoefficientProvider {
    fn load(&self, generation: CameraGeneration) -> Result<CalibrationCoefficients>;
}

/// Reads coefficients from `<root>/<generation tag>/*.npy`.
#[derive(Debug, Clone)]
pub struct NpyCoefficientStore {
    root: PathBuf,
}

impl NpyCoefficientStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn generation_dir(&self, generation: CameraGeneration) -> PathBuf {
        self.root.join(generation.tag())
    }
}

fn to_indices(values: Vec<f64>) -> Result<Vec<usize>> {
    values
        .into_iter()
        .map(|v| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(CalibrationError::InvalidReferenceData(format!(
                    "band match index {} is not a non-negative integer",
                    v
                )))
            }
        })
        .collect()
}

impl CoefficientProvider for NpyCoefficientStore {
    fn load(&self, generation: CameraGeneration) -> Result<CalibrationCoefficients> {
        let dir = self.generation_dir(generation);
        debug!("Loading calibration model from {}", dir.display());

        let band_match_index = to_indices(read_npy(dir.join(BAND_MATCH_FILE))?.data)?;
        let bias = Array1::from(read_npy(dir.join(BIAS_FILE))?.data);
        let gain = Array1::from(read_npy(dir.join(GAIN_FILE))?.data);

        Ok(CalibrationCoefficients {
            band_match_index,
            gain,
            bias,
        })
    }
}
