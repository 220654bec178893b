//! Array file rewriting module
//!
//! This module produces the calibrated NetCDF deliverable as a structural
//! copy of the workflow's template with the reflectance variable replaced.

mod writer;
mod netcdf_rewriter;
pub mod types;

pub use writer::ArrayFileWriter;
pub use netcdf_rewriter::{NetcdfRewriter, calibrated_output_path};
pub use types::{
    EXCLUDED_VARIABLE,
    MissingReflectancePolicy,
    REFLECTANCE_VARIABLE,
};
