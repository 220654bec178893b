//! Hyperspectral calibration module
//!
//! This module turns raw imaging-spectrometer cubes into calibrated reflectance,
//! with separate modules for camera profiles, ambient irradiance logs, raw cube
//! reading, coefficient application, NetCDF rewriting and run orchestration.

pub mod common;
pub mod profile;
pub mod irradiance;
pub mod raw;
pub mod coefficients;
pub mod array_file;
pub mod pipeline;
pub mod transform;

pub use common::{
    CalibrationError,
    Result,
};

pub use profile::{
    CameraGeneration,
    CameraProfile,
    Sensor,
};

pub use irradiance::{
    IrradianceRecord,
    IrradianceSeries,
};

pub use raw::{
    EnviReader,
    RawCubeReader,
    RawScan,
    SpectralCube,
};

pub use coefficients::{
    CalibrationCoefficients,
    CoefficientProvider,
    NpyCoefficientStore,
};

pub use array_file::{
    ArrayFileWriter,
    MissingReflectancePolicy,
    NetcdfRewriter,
};

pub use pipeline::{
    CalibrationConfig,
    CalibrationConfigBuilder,
    CalibrationJob,
    CalibrationPipeline,
    CalibrationStage,
    PipelineTimings,
};

pub use transform::{
    MemoryProbe,
    SystemMemory,
    TransformRequest,
    TransformResult,
};
