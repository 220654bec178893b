//! Nearest-time matching of an image against the irradiance series

use ndarray::{Array1, Axis, s};
use tracing::{debug, warn};

use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::irradiance::reader::clock_to_seconds;
use crate::calibration::irradiance::types::IrradianceSeries;

/// Index of the reading closest in time to `image_time`. The earliest index
/// wins on ties.
pub fn closest_index(image_time: u32, times: &[u32]) -> Option<usize> {
    times
        .iter()
        .enumerate()
        .min_by_key(|(_, t)| image_time.abs_diff(**t))
        .map(|(i, _)| i)
}

/// Averages `window_size` consecutive readings starting at the one closest to
/// `image_time`. A window running past the end of the series is clamped.
pub fn mean_spectrum(
    image_time: u32,
    series: &IrradianceSeries,
    window_size: usize,
) -> Result<Array1<f64>> {
    let start = closest_index(image_time, &series.times).ok_or_else(|| {
        CalibrationError::EmptySeries("no environment logger readings to match against".to_string())
    })?;

    let window_size = window_size.max(1);
    let requested_end = start + window_size;
    let end = requested_end.min(series.len());
    if end < requested_end {
        warn!(
            "Irradiance window of {} readings at index {} overruns the {} available, averaging {}",
            window_size,
            start,
            series.len(),
            end - start
        );
    }
    debug!(
        "Closest irradiance reading {} at {}s for image time {}s",
        start, series.times[start], image_time
    );

    series
        .spectra
        .slice(s![start..end, ..])
        .mean_axis(Axis(0))
        .ok_or_else(|| CalibrationError::EmptySeries("irradiance window is empty".to_string()))
}

/// Seconds of day of an ISO 8601 request timestamp such as
/// `2018-08-18T12:38:49-05:00`. A bare `HH:MM:SS` is accepted as well.
pub fn image_time_of_day(timestamp: &str) -> Result<u32> {
    let time = timestamp.split_once('T').map_or(timestamp, |(_, time)| time);

    time.get(0..8)
        .filter(|clock| clock.as_bytes()[2] == b':' && clock.as_bytes()[5] == b':')
        .and_then(|clock| clock_to_seconds(&clock.replace(':', "")))
        .ok_or_else(|| {
            CalibrationError::InvalidArgument(format!(
                "timestamp '{}' has no HH:MM:SS time of day",
                timestamp
            ))
        })
}
