use std::path::Path;

use ndarray::Array3;

use crate::calibration::common::error::Result;
use crate::calibration::profile::CameraGeneration;

pub trait ArrayFileWriter {
    /// Writes `output` as a copy of `template` whose reflectance variable holds
    /// `payload`, laid out as (band, row, column).
    fn rewrite(
        &self,
        template: &Path,
        output: &Path,
        payload: &Array3<f32>,
        generation: CameraGeneration,
    ) -> Result<()>;
}
