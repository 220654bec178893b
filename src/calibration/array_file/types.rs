//! Array file rewriting types

/// Variable receiving the calibrated reflectance
pub const REFLECTANCE_VARIABLE: &str = "rfl_img";

/// Map preview variable that is not carried into the calibrated file
pub const EXCLUDED_VARIABLE: &str = "Google_Map_View";

/// Dimension names used when the reflectance variable has to be created
pub const REFLECTANCE_DIMENSIONS: [&str; 3] = ["wavelength", "y", "x"];

/// What to do when the template has no reflectance variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingReflectancePolicy {
    /// Create a (band, row, column) variable sized to the payload and fill it
    #[default]
    Dimensioned,
    /// Create a dimensionless `f32` variable and write no data, as earlier
    /// releases of the transformer did
    Scalar,
}
