//! Host-facing entry point
//!
//! Validates a transform request, runs the pre-flight memory check and hands
//! the scan to a [`CalibrationPipeline`], reporting the outcome as a result
//! code rather than an error.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tracing::{debug, error, info};

use crate::calibration::{
    array_file::{ArrayFileWriter, calibrated_output_path},
    coefficients::CoefficientProvider,
    common::error::{CalibrationError, Result},
    pipeline::{CalibrationJob, CalibrationPipeline},
    profile::{Sensor, parse_data_date},
    raw::RawCubeReader,
};

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_NO_RAW_FILE: i32 = -1000;
pub const CODE_NO_LOG_FOLDER: i32 = -1001;
pub const CODE_MEMORY_CHECK: i32 = -1002;
pub const CODE_CALIBRATION: i32 = -1004;

const RAW_SUFFIX: &str = "_raw";

/// One request from the host: which scan to calibrate and where its inputs live.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformRequest {
    pub sensor: String,
    /// ISO 8601 acquisition timestamp
    pub timestamp: String,
    pub working_folder: PathBuf,
    pub environment_logger: PathBuf,
    pub files: Vec<PathBuf>,
    /// Replaces the date taken from `timestamp`
    #[serde(default)]
    pub date_override: Option<String>,
    #[serde(default)]
    pub skip_memory_check: bool,
}

impl TransformRequest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CalibrationError::InputNotFound(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            CalibrationError::InvalidArgument(format!("{}: {}", path.display(), e))
        })
    }

    fn calibration_job(&self, raw_file: &Path) -> Result<CalibrationJob> {
        let sensor: Sensor = self.sensor.parse()?;
        let data_date = parse_data_date(self.date_override.as_deref().unwrap_or(&self.timestamp))?;
        let (template, output) = output_paths(&self.working_folder, raw_file);
        debug!("Sensor: {}  Data date: {}", sensor, data_date);
        debug!("Output filename: {}", template.display());
        debug!("Calibration filename: {}", output.display());

        Ok(CalibrationJob {
            raw_path: raw_file.to_path_buf(),
            sensor,
            data_date,
            timestamp: self.timestamp.clone(),
            environment_logger: self.environment_logger.clone(),
            template,
            output,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransformResult {
    pub fn success() -> Self {
        Self {
            code: CODE_SUCCESS,
            error: None,
        }
    }

    pub fn failure(code: i32, error: impl Into<String>) -> Self {
        Self {
            code,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

/// Source of the amount of memory available to a run.
pub trait MemoryProbe {
    fn available_bytes(&self) -> u64;
}

/// Reads available memory from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> u64 {
        let system = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        system.available_memory()
    }
}

/// The last listed file whose name ends in `_raw`.
pub fn find_raw_file(files: &[PathBuf]) -> Option<&Path> {
    files
        .iter()
        .rev()
        .find(|f| f.to_string_lossy().ends_with(RAW_SUFFIX))
        .map(PathBuf::as_path)
}

/// Template written by the imaging workflow and the calibrated file derived
/// from it, both named after the raw file and placed in `working_folder`.
pub fn output_paths(working_folder: &Path, raw_file: &Path) -> (PathBuf, PathBuf) {
    let stem = raw_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let template = working_folder.join(format!("{}.nc", stem));
    let output = calibrated_output_path(&template);
    (template, output)
}

/// Fails when the raw file would not fit in available memory with
/// `reserve_bytes` left over.
pub fn check_raw_file_size<M: MemoryProbe + ?Sized>(
    raw_file: &Path,
    probe: &M,
    reserve_bytes: u64,
) -> Result<()> {
    let size = std::fs::metadata(raw_file)?.len();
    let available = probe.available_bytes();

    if available <= size {
        return Err(CalibrationError::ResourceExhaustion(format!(
            "RAW file size {} is too large for available memory {}: '{}'",
            size,
            available,
            raw_file.display()
        )));
    }
    if available.saturating_sub(reserve_bytes) <= size {
        return Err(CalibrationError::ResourceExhaustion(format!(
            "RAW file size {} will consume available and reserved memory: {} ({} + {}): '{}'",
            size,
            available + reserve_bytes,
            available,
            reserve_bytes,
            raw_file.display()
        )));
    }
    Ok(())
}

/// Runs one request end to end. Every failure is reported through the result
/// code and message.
pub fn perform_process<R, P, W, M>(
    request: &TransformRequest,
    pipeline: &CalibrationPipeline<R, P, W>,
    probe: &M,
) -> TransformResult
where
    R: RawCubeReader,
    P: CoefficientProvider,
    W: ArrayFileWriter,
    M: MemoryProbe + ?Sized,
{
    let Some(raw_file) = find_raw_file(&request.files) else {
        return TransformResult::failure(
            CODE_NO_RAW_FILE,
            "A RAW file was not found in the provided list",
        );
    };
    if !request.environment_logger.is_dir() {
        return TransformResult::failure(
            CODE_NO_LOG_FOLDER,
            format!(
                "The environmental logger folder was not found: '{}'",
                request.environment_logger.display()
            ),
        );
    }
    if !request.skip_memory_check {
        let reserve = pipeline.config().memory_reserve_bytes;
        if let Err(e) = check_raw_file_size(raw_file, probe, reserve) {
            return TransformResult::failure(
                CODE_MEMORY_CHECK,
                format!("Try using the --skip_memory_check switch. {}", e),
            );
        }
    }

    info!("Running calibration");
    let outcome = request.calibration_job(raw_file).and_then(|job| {
        let timings = pipeline.calibrate_with_timings(&job)?;
        timings.log_summary();
        Ok(job.output)
    });
    match outcome {
        Ok(output) => {
            info!("Calibrated file written to {}", output.display());
            TransformResult::success()
        }
        Err(e) => {
            let msg = format!("Exception caught while applying calibration: {}", e);
            error!(kind = e.kind(), "{}", msg);
            TransformResult::failure(CODE_CALIBRATION, msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::array_file::REFLECTANCE_VARIABLE;
    use crate::calibration::pipeline::CalibrationConfig;
    use crate::calibration::raw::header_path;
    use std::fs;
    use tempfile::tempdir;

    struct FixedMemory(u64);

    impl MemoryProbe for FixedMemory {
        fn available_bytes(&self) -> u64 {
            self.0
        }
    }

    fn request(dir: &Path, files: Vec<PathBuf>) -> TransformRequest {
        TransformRequest {
            sensor: "SWIR".to_string(),
            timestamp: "2018-09-01T12:00:05-05:00".to_string(),
            working_folder: dir.to_path_buf(),
            environment_logger: dir.to_path_buf(),
            files,
            date_override: None,
            skip_memory_check: false,
        }
    }

    fn write_raw(dir: &Path) -> PathBuf {
        let raw = dir.join("scan_raw");
        let values: Vec<u8> = (1..=12u16).flat_map(|v| v.to_le_bytes()).collect();
        fs::write(&raw, values).unwrap();
        fs::write(
            header_path(&raw),
            "ENVI\nsamples = 2\nlines = 2\nbands = 3\nheader offset = 0\ndata type = 12\ninterleave = bsq\nbyte order = 0\n",
        )
        .unwrap();
        raw
    }

    fn write_template(path: &Path) {
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension("wavelength", 3).unwrap();
        file.add_dimension("y", 2).unwrap();
        file.add_dimension("x", 2).unwrap();
        file.add_variable::<f32>(REFLECTANCE_VARIABLE, &["wavelength", "y", "x"])
            .unwrap();
    }

    #[test]
    fn test_find_raw_file_takes_last_match() {
        let files = vec![
            PathBuf::from("/in/a_raw"),
            PathBuf::from("/in/a_raw.hdr"),
            PathBuf::from("/in/b_raw"),
            PathBuf::from("/in/b_frameIndex.txt"),
        ];
        assert_eq!(find_raw_file(&files), Some(Path::new("/in/b_raw")));
        assert_eq!(find_raw_file(&files[1..2]), None);
    }

    #[test]
    fn test_output_paths() {
        let (template, output) = output_paths(Path::new("/work"), Path::new("/in/scan_raw"));
        assert_eq!(template, PathBuf::from("/work/scan_raw.nc"));
        assert_eq!(output, PathBuf::from("/work/scan_raw_newrfl.nc"));
    }

    #[test]
    fn test_request_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("request.json");
        fs::write(
            &path,
            r#"{"sensor": "VNIR", "timestamp": "2019-06-01T12:00:05-05:00",
                "working_folder": "/work", "environment_logger": "/logs",
                "files": ["/in/scan_raw", "/in/scan_raw.hdr"]}"#,
        )
        .unwrap();

        let request = TransformRequest::from_file(&path).unwrap();
        assert_eq!(request.sensor, "VNIR");
        assert_eq!(request.files.len(), 2);
        assert!(request.date_override.is_none());
        assert!(!request.skip_memory_check);
    }

    #[test]
    fn test_memory_check() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("scan_raw");
        fs::write(&raw, vec![0u8; 100]).unwrap();

        assert!(check_raw_file_size(&raw, &FixedMemory(1000), 10).is_ok());
        assert!(matches!(
            check_raw_file_size(&raw, &FixedMemory(100), 0),
            Err(CalibrationError::ResourceExhaustion(_))
        ));
        // fits, but not with the reserve
        let err = check_raw_file_size(&raw, &FixedMemory(150), 50).unwrap_err();
        assert!(err.to_string().contains("will consume available and reserved memory"));
    }

    #[test]
    fn test_result_serialization() {
        assert_eq!(
            serde_json::to_string(&TransformResult::success()).unwrap(),
            r#"{"code":0}"#
        );
        assert_eq!(
            serde_json::to_string(&TransformResult::failure(-1000, "nope")).unwrap(),
            r#"{"code":-1000,"error":"nope"}"#
        );
    }

    #[test]
    fn test_no_raw_file() {
        let dir = tempdir().unwrap();
        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());
        let result = perform_process(
            &request(dir.path(), vec![dir.path().join("scan.hdr")]),
            &pipeline,
            &FixedMemory(u64::MAX),
        );
        assert_eq!(result.code, CODE_NO_RAW_FILE);
    }

    #[test]
    fn test_missing_log_folder() {
        let dir = tempdir().unwrap();
        let raw = write_raw(dir.path());
        let mut req = request(dir.path(), vec![raw]);
        req.environment_logger = dir.path().join("missing");

        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());
        let result = perform_process(&req, &pipeline, &FixedMemory(u64::MAX));
        assert_eq!(result.code, CODE_NO_LOG_FOLDER);
        assert!(result.error.unwrap().starts_with("The environmental logger folder was not found"));
    }

    #[test]
    fn test_memory_check_failure_and_skip() {
        let dir = tempdir().unwrap();
        let raw = write_raw(dir.path());
        write_template(&dir.path().join("scan_raw.nc"));
        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());

        let mut req = request(dir.path(), vec![raw]);
        let result = perform_process(&req, &pipeline, &FixedMemory(1024));
        assert_eq!(result.code, CODE_MEMORY_CHECK);
        assert!(result.error.unwrap().starts_with("Try using the --skip_memory_check switch. "));

        req.skip_memory_check = true;
        let result = perform_process(&req, &pipeline, &FixedMemory(1024));
        assert_eq!(result, TransformResult::success());
    }

    #[test]
    fn test_calibration_error_is_reported() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("scan_raw");
        fs::write(&raw, [0u8; 24]).unwrap();

        let mut req = request(dir.path(), vec![raw]);
        req.skip_memory_check = true;
        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());
        let result = perform_process(&req, &pipeline, &SystemMemory);

        assert_eq!(result.code, CODE_CALIBRATION);
        let msg = result.error.unwrap();
        assert!(msg.starts_with(
            "Exception caught while applying calibration: Missing RAW associated file"
        ));
    }

    #[test]
    fn test_unknown_sensor_is_a_calibration_error() {
        let dir = tempdir().unwrap();
        let raw = write_raw(dir.path());
        let mut req = request(dir.path(), vec![raw]);
        req.sensor = "thermal".to_string();
        req.skip_memory_check = true;

        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());
        let result = perform_process(&req, &pipeline, &SystemMemory);
        assert_eq!(result.code, CODE_CALIBRATION);
    }

    #[test]
    fn test_uncalibrated_swir_end_to_end() {
        let dir = tempdir().unwrap();
        let raw = write_raw(dir.path());
        write_template(&dir.path().join("scan_raw.nc"));
        let pipeline = CalibrationPipeline::new(CalibrationConfig::default());

        let result = perform_process(
            &request(dir.path(), vec![raw]),
            &pipeline,
            &FixedMemory(u64::MAX),
        );
        assert!(result.is_success(), "{:?}", result);

        let file = netcdf::open(dir.path().join("scan_raw_newrfl.nc")).unwrap();
        let values = file
            .variable(REFLECTANCE_VARIABLE)
            .unwrap()
            .get_values::<f32, _>(..)
            .unwrap();
        // bsq storage is already band-major
        let expected: Vec<f32> = (1..=12).map(|v| v as f32).collect();
        assert_eq!(values, expected);
    }
}
