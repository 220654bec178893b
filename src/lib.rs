pub mod calibration;
pub mod logger;
