//! Camera profile resolution
//!
//! Maps a sensor and an acquisition date to the camera generation that was
//! mounted at the time, together with its band counts and scan duration.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::calibration::common::error::{CalibrationError, Result};

/// Environment logger records are written every 5 seconds.
pub const SECONDS_PER_IRRADIANCE_RECORD: u32 = 5;

/// Imaging sensors carried by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    /// Visible and near-infrared camera (primary sensor)
    Vnir,
    /// Short-wave infrared camera (secondary sensor)
    Swir,
}

impl FromStr for Sensor {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VNIR" => Ok(Sensor::Vnir),
            "SWIR" => Ok(Sensor::Swir),
            _ => Err(CalibrationError::InvalidArgument(format!(
                "unknown sensor '{}', expected VNIR or SWIR",
                s
            ))),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::Vnir => write!(f, "VNIR"),
            Sensor::Swir => write!(f, "SWIR"),
        }
    }
}

/// Hardware and calibration era of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraGeneration {
    VnirOld,
    VnirMiddle,
    VnirNew,
    /// Old and middle SWIR cameras, for which no calibration model exists
    SwirOldMiddle,
    SwirNew,
}

impl CameraGeneration {
    /// Tag naming the generation's reference-data directory.
    pub fn tag(&self) -> &'static str {
        match self {
            CameraGeneration::VnirOld => "vnir_old",
            CameraGeneration::VnirMiddle => "vnir_middle",
            CameraGeneration::VnirNew => "vnir_new",
            CameraGeneration::SwirOldMiddle => "swir_old_middle",
            CameraGeneration::SwirNew => "swir_new",
        }
    }

    /// Number of leading bands with calibration coverage on legacy VNIR cameras.
    pub fn legacy_band_cutoff(&self) -> Option<usize> {
        match self {
            CameraGeneration::VnirOld => Some(679),
            CameraGeneration::VnirMiddle => Some(662),
            _ => None,
        }
    }
}

impl fmt::Display for CameraGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraProfile {
    pub generation: CameraGeneration,
    /// Spectral bands recorded by the imaging sensor
    pub spectral_band_count: Option<usize>,
    /// Spectral bands recorded by the ambient irradiance sensor
    pub irradiance_band_count: Option<usize>,
    /// Average duration of one scan in seconds
    pub scan_duration_seconds: Option<u32>,
}

impl CameraProfile {
    fn uncalibrated(generation: CameraGeneration) -> Self {
        Self {
            generation,
            spectral_band_count: None,
            irradiance_band_count: None,
            scan_duration_seconds: None,
        }
    }

    fn calibrated(
        generation: CameraGeneration,
        spectral_bands: usize,
        irradiance_bands: usize,
        scan_seconds: u32,
    ) -> Self {
        Self {
            generation,
            spectral_band_count: Some(spectral_bands),
            irradiance_band_count: Some(irradiance_bands),
            scan_duration_seconds: Some(scan_seconds),
        }
    }

    pub fn requires_calibration(&self) -> bool {
        self.spectral_band_count.is_some()
            && self.irradiance_band_count.is_some()
            && self.scan_duration_seconds.is_some()
    }

    /// Number of irradiance records spanning one scan, or `None` without a
    /// calibration model.
    pub fn window_size(&self) -> Option<usize> {
        self.scan_duration_seconds
            .map(|secs| (secs / SECONDS_PER_IRRADIANCE_RECORD) as usize)
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Resolves the camera profile for `sensor` on `data_date`.
///
/// Each bracket includes its lower bound: a scan taken on 2018-08-18 belongs to
/// the middle VNIR generation.
pub fn resolve(sensor: Sensor, data_date: NaiveDate) -> CameraProfile {
    let vnir_middle_start = date(2018, 8, 18);
    let new_cameras_start = date(2019, 2, 26);

    match sensor {
        Sensor::Vnir if data_date < vnir_middle_start => {
            CameraProfile::calibrated(CameraGeneration::VnirOld, 955, 1024, 540)
        }
        Sensor::Vnir if data_date < new_cameras_start => {
            CameraProfile::calibrated(CameraGeneration::VnirMiddle, 939, 1024, 540)
        }
        // Averages 3.5 minutes per scan
        Sensor::Vnir => CameraProfile::calibrated(CameraGeneration::VnirNew, 939, 3648, 210),
        Sensor::Swir if data_date < new_cameras_start => {
            CameraProfile::uncalibrated(CameraGeneration::SwirOldMiddle)
        }
        Sensor::Swir => CameraProfile::calibrated(CameraGeneration::SwirNew, 275, 512, 210),
    }
}

/// Parses a `YYYY-MM-DD` date, tolerating `/` and `_` separators. Only the
/// first ten characters are read so a full ISO 8601 timestamp is accepted.
pub fn parse_data_date(raw: &str) -> Result<NaiveDate> {
    let head: String = raw.chars().take(10).collect();
    let normalized = head.replace(['/', '_'], "-");
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").map_err(|e| {
        CalibrationError::InvalidArgument(format!("invalid data date '{}': {}", raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("Invalid date")
    }

    #[test]
    fn test_vnir_brackets() {
        assert_eq!(resolve(Sensor::Vnir, ymd(2017, 5, 1)).generation, CameraGeneration::VnirOld);
        assert_eq!(resolve(Sensor::Vnir, ymd(2018, 8, 17)).generation, CameraGeneration::VnirOld);
        assert_eq!(
            resolve(Sensor::Vnir, ymd(2018, 8, 18)).generation,
            CameraGeneration::VnirMiddle
        );
        assert_eq!(
            resolve(Sensor::Vnir, ymd(2019, 2, 25)).generation,
            CameraGeneration::VnirMiddle
        );
        assert_eq!(resolve(Sensor::Vnir, ymd(2019, 2, 26)).generation, CameraGeneration::VnirNew);
    }

    #[test]
    fn test_swir_brackets() {
        let old = resolve(Sensor::Swir, ymd(2019, 2, 25));
        assert_eq!(old.generation, CameraGeneration::SwirOldMiddle);
        assert!(!old.requires_calibration());
        assert_eq!(old.window_size(), None);

        let new = resolve(Sensor::Swir, ymd(2019, 2, 26));
        assert_eq!(new.generation, CameraGeneration::SwirNew);
        assert_eq!(new.spectral_band_count, Some(275));
        assert_eq!(new.irradiance_band_count, Some(512));
        assert_eq!(new.window_size(), Some(42));
    }

    #[test]
    fn test_profile_values() {
        let old = resolve(Sensor::Vnir, ymd(2016, 9, 1));
        assert_eq!(old.spectral_band_count, Some(955));
        assert_eq!(old.irradiance_band_count, Some(1024));
        assert_eq!(old.window_size(), Some(108));
        assert_eq!(old.generation.legacy_band_cutoff(), Some(679));

        let middle = resolve(Sensor::Vnir, ymd(2018, 12, 1));
        assert_eq!(middle.generation.legacy_band_cutoff(), Some(662));

        let new = resolve(Sensor::Vnir, ymd(2020, 1, 1));
        assert_eq!(new.irradiance_band_count, Some(3648));
        assert_eq!(new.generation.legacy_band_cutoff(), None);
        assert!(new.requires_calibration());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let d = ymd(2018, 8, 18);
        assert_eq!(resolve(Sensor::Vnir, d), resolve(Sensor::Vnir, d));
    }

    #[test]
    fn test_sensor_from_str() {
        assert_eq!("VNIR".parse::<Sensor>().unwrap(), Sensor::Vnir);
        assert_eq!("swir".parse::<Sensor>().unwrap(), Sensor::Swir);
        assert!(matches!(
            "RGB".parse::<Sensor>(),
            Err(CalibrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_data_date() {
        assert_eq!(parse_data_date("2018-08-18T12:38:49-05:00").unwrap(), ymd(2018, 8, 18));
        assert_eq!(parse_data_date("2018/08/18").unwrap(), ymd(2018, 8, 18));
        assert_eq!(parse_data_date("2018_08_18").unwrap(), ymd(2018, 8, 18));
        assert!(parse_data_date("yesterday").is_err());
    }
}
