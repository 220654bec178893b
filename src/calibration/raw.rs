//! Raw cube reading module
//!
//! This module provides access to imaging-spectrometer cubes stored as ENVI
//! raw files, memory-mapped rather than loaded.

mod reader;
mod envi_reader;
pub mod header;
pub mod types;

pub use reader::RawCubeReader;
pub use envi_reader::{EnviReader, header_path};
pub use header::{EnviDataType, EnviHeader, Interleave};
pub use types::{RawScan, SpectralCube, bands_first};
