//! Radiometric coefficient module
//!
//! Loads per-generation gain, bias and band-match arrays and applies them to
//! turn raw digital numbers into reflectance.

mod apply;
pub mod npy;
mod provider;
pub mod types;

pub use apply::{compute_reference, compute_reflectance, count_non_finite, effective_band_count};
pub use provider::{CoefficientProvider, NpyCoefficientStore};
pub use types::CalibrationCoefficients;
