use std::path::Path;

use crate::calibration::common::error::Result;
use crate::calibration::raw::types::SpectralCube;

pub trait RawCubeReader {
    type Cube: SpectralCube;

    fn open(&self, raw_path: &Path) -> Result<Self::Cube>;
}
