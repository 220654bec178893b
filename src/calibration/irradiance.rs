//! Ambient irradiance module
//!
//! Reads environment logger files into an irradiance time series and matches
//! an image acquisition time against it.

mod reader;
pub mod matcher;
pub mod types;

pub use reader::{read_folder, read_log, ENVIRONMENT_LOG_SUFFIX};
pub use types::{IrradianceRecord, IrradianceSeries};
