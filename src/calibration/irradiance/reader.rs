use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::irradiance::types::{IrradianceRecord, IrradianceSeries};
use crate::calibration::profile::CameraGeneration;

/// Files in a log folder ending with this suffix are environment logs.
pub const ENVIRONMENT_LOG_SUFFIX: &str = "environmentlogger.json";

const VNIR_SPECTROMETER: &str = "FLAME-T";
const SWIR_SPECTROMETER: &str = "NIRQuest-512";

#[derive(Debug, Deserialize)]
struct EnvironmentLog {
    environment_sensor_readings: Vec<SensorReading>,
}

#[derive(Debug, Deserialize)]
struct SensorReading {
    timestamp: String,
    /// Multi-instrument layout, keyed by spectrometer name
    spectrometers: Option<HashMap<String, Spectrometer>>,
    /// Single-instrument layout of the earliest logs
    spectrometer: Option<Spectrometer>,
}

#[derive(Debug, Deserialize)]
struct Spectrometer {
    spectrum: Vec<f64>,
}

/// Converts a logger timestamp such as `2016.08.30-12:38:49` to seconds of day.
///
/// Separators are normalised to spaces, colons dropped, and the fourth token
/// (`HHMMSS`) is read.
pub(crate) fn parse_log_timestamp(timestamp: &str) -> Result<u32> {
    let normalized = timestamp.replace(['.', '-'], " ").replace(':', "");
    let token = normalized.split_whitespace().nth(3).ok_or_else(|| {
        CalibrationError::MalformedLog(format!("timestamp '{}' has no time component", timestamp))
    })?;

    clock_to_seconds(token).ok_or_else(|| {
        CalibrationError::MalformedLog(format!(
            "timestamp '{}' has an invalid time '{}'",
            timestamp, token
        ))
    })
}

/// Converts a packed `HHMMSS` clock value to seconds since midnight.
pub(crate) fn clock_to_seconds(token: &str) -> Option<u32> {
    if token.len() != 6 || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let packed: u32 = token.parse().ok()?;
    let (hours, minutes, seconds) = (packed / 10_000, (packed / 100) % 100, packed % 100);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

fn select_spectrum(generation: CameraGeneration, reading: SensorReading) -> Result<Vec<f64>> {
    match reading.spectrometers {
        Some(mut spectrometers) => {
            let name = if generation == CameraGeneration::SwirNew {
                SWIR_SPECTROMETER
            } else {
                VNIR_SPECTROMETER
            };
            spectrometers
                .remove(name)
                .map(|s| s.spectrum)
                .ok_or_else(|| {
                    CalibrationError::MalformedLog(format!(
                        "reading at '{}' has no '{}' spectrometer",
                        reading.timestamp, name
                    ))
                })
        }
        None => reading.spectrometer.map(|s| s.spectrum).ok_or_else(|| {
            CalibrationError::MalformedLog(format!(
                "reading at '{}' has no spectrometer data",
                reading.timestamp
            ))
        }),
    }
}

/// Parses one environment logger file.
pub fn read_log<P: AsRef<Path>>(
    generation: CameraGeneration,
    path: P,
) -> Result<Vec<IrradianceRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let log: EnvironmentLog = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CalibrationError::MalformedLog(format!("{}: {}", path.display(), e)))?;

    if log.environment_sensor_readings.is_empty() {
        warn!("Environment log {} contains no readings", path.display());
    }

    log.environment_sensor_readings
        .into_iter()
        .map(|reading| {
            let time_of_day = parse_log_timestamp(&reading.timestamp)?;
            let spectrum = select_spectrum(generation, reading)?;
            Ok(IrradianceRecord {
                time_of_day,
                spectrum,
            })
        })
        .collect()
}

/// Reads every environment log of `folder` into one series.
///
/// Files are visited in directory order and their readings appended as they
/// come, so the result is not sorted by time. A folder without logs yields an
/// empty series.
pub fn read_folder<P: AsRef<Path>>(
    generation: CameraGeneration,
    folder: P,
) -> Result<IrradianceSeries> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(CalibrationError::InputNotFound(format!(
            "The environmental logger folder was not found: '{}'",
            folder.display()
        )));
    }

    debug!("Reading environment logs from {}", folder.display());

    let mut records: Vec<IrradianceRecord> = Vec::new();
    let mut files_read = 0usize;
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(ENVIRONMENT_LOG_SUFFIX) {
            continue;
        }
        debug!("Loading environment logger file: '{}'", name.to_string_lossy());
        records.extend(read_log(generation, entry.path())?);
        files_read += 1;
    }
    info!("Read in {} environment logger files", files_read);

    stack_records(records)
}

fn stack_records(records: Vec<IrradianceRecord>) -> Result<IrradianceSeries> {
    let Some(first) = records.first() else {
        return Ok(IrradianceSeries::empty());
    };
    let band_count = first.spectrum.len();

    let mut times = Vec::with_capacity(records.len());
    let mut values = Vec::with_capacity(records.len() * band_count);
    for record in records {
        if record.spectrum.len() != band_count {
            return Err(CalibrationError::MalformedLog(format!(
                "spectrum of {} bands does not match the {} bands of earlier readings",
                record.spectrum.len(),
                band_count
            )));
        }
        times.push(record.time_of_day);
        values.extend(record.spectrum);
    }

    let spectra = Array2::from_shape_vec((times.len(), band_count), values)
        .map_err(|e| CalibrationError::MalformedLog(e.to_string()))?;

    Ok(IrradianceSeries { times, spectra })
}
