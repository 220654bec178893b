//! Coefficient data types

use ndarray::Array1;

/// Precomputed calibration model of one camera generation
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCoefficients {
    /// Irradiance band matching each imaging-sensor band
    pub band_match_index: Vec<usize>,
    /// Per-band gain from irradiance to digital number
    pub gain: Array1<f64>,
    /// Per-band bias from irradiance to digital number
    pub bias: Array1<f64>,
}
