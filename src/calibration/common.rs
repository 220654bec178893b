//! Common utilities module
//!
//! This module contains shared utilities used across the calibration engine.

pub mod error;

pub use error::{CalibrationError, Result};
