//! Irradiance data types

use ndarray::Array2;

/// One environment logger reading
#[derive(Debug, Clone, PartialEq)]
pub struct IrradianceRecord {
    /// Time of day of the reading, in seconds since midnight
    pub time_of_day: u32,
    /// Ambient spectrum measured by the irradiance sensor
    pub spectrum: Vec<f64>,
}

/// Readings from every log file of a folder, in folder iteration order.
///
/// Row `i` of `spectra` was measured at `times[i]`. The rows are not sorted by
/// time.
#[derive(Debug, Clone)]
pub struct IrradianceSeries {
    pub times: Vec<u32>,
    pub spectra: Array2<f64>,
}

impl IrradianceSeries {
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            spectra: Array2::zeros((0, 0)),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn band_count(&self) -> usize {
        self.spectra.ncols()
    }
}
