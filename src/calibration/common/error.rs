use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InputNotFound(String),

    #[error("{0}")]
    ResourceExhaustion(String),

    #[error("Malformed environment log: {0}")]
    MalformedLog(String),

    #[error("Malformed ENVI header: {0}")]
    MalformedHeader(String),

    #[error("No irradiance data available: {0}")]
    EmptySeries(String),

    #[error("Reflectance contains {count} non-finite values out of {total}")]
    ArithmeticAnomaly { count: usize, total: usize },

    #[error("Invalid calibration reference data: {0}")]
    InvalidReferenceData(String),

    #[error("Failed to write array file: {0}")]
    IoFailure(String),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalibrationError {
    /// Stable name of the error kind, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            CalibrationError::InvalidArgument(_) => "invalid_argument",
            CalibrationError::InputNotFound(_) => "input_not_found",
            CalibrationError::ResourceExhaustion(_) => "resource_exhaustion",
            CalibrationError::MalformedLog(_) => "malformed_log",
            CalibrationError::MalformedHeader(_) => "malformed_header",
            CalibrationError::EmptySeries(_) => "empty_series",
            CalibrationError::ArithmeticAnomaly { .. } => "arithmetic_anomaly",
            CalibrationError::InvalidReferenceData(_) => "invalid_reference_data",
            CalibrationError::IoFailure(_) | CalibrationError::NetCdf(_) => "io_failure",
            CalibrationError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
