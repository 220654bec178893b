use ndarray::{Array1, Array3};
use tracing::debug;

use crate::calibration::coefficients::types::CalibrationCoefficients;
use crate::calibration::common::error::{CalibrationError, Result};
use crate::calibration::profile::CameraGeneration;
use crate::calibration::raw::types::SpectralCube;

/// Bands that take part in the division: the legacy cutoff when the
/// generation has one, otherwise all `band_count` bands.
pub fn effective_band_count(generation: CameraGeneration, band_count: usize) -> usize {
    generation
        .legacy_band_cutoff()
        .map_or(band_count, |cutoff| cutoff.min(band_count))
}

/// Irradiance-to-DN reference per imaging band: `gain * projected + bias`,
/// where `projected` is the mean ambient spectrum gathered through the band
/// match index.
pub fn compute_reference(
    generation: CameraGeneration,
    mean_spectrum: &Array1<f64>,
    coefficients: &CalibrationCoefficients,
) -> Result<Array1<f64>> {
    let projected = coefficients
        .band_match_index
        .iter()
        .map(|&i| {
            mean_spectrum.get(i).copied().ok_or_else(|| {
                CalibrationError::InvalidReferenceData(format!(
                    "band match index {} is outside the {}-band irradiance spectrum",
                    i,
                    mean_spectrum.len()
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let bands = match generation.legacy_band_cutoff() {
        Some(cutoff) if projected.len() < cutoff => {
            return Err(CalibrationError::InvalidReferenceData(format!(
                "{} bands projected, {} requires at least {}",
                projected.len(),
                generation,
                cutoff
            )));
        }
        Some(cutoff) => cutoff,
        None => projected.len(),
    };
    let projected = Array1::from(projected).slice_move(ndarray::s![..bands]);

    if coefficients.gain.len() != bands || coefficients.bias.len() != bands {
        return Err(CalibrationError::InvalidReferenceData(format!(
            "gain ({}) and bias ({}) do not match the {} calibrated bands",
            coefficients.gain.len(),
            coefficients.bias.len(),
            bands
        )));
    }

    debug!("Irradiance-to-DN reference over {} bands", bands);
    Ok(&coefficients.gain * &projected + &coefficients.bias)
}

/// Divides raw digital numbers by `reference` and returns the result as a
/// (band, row, column) array.
///
/// A zero reference band yields infinite or NaN cells; they are returned as
/// computed.
pub fn compute_reflectance<C: SpectralCube + ?Sized>(
    raw: &C,
    reference: &Array1<f64>,
    generation: CameraGeneration,
) -> Result<Array3<f32>> {
    let (rows, cols, bands) = raw.shape();
    let bands = effective_band_count(generation, bands);
    if bands != reference.len() {
        return Err(CalibrationError::InvalidReferenceData(format!(
            "raw cube has {} calibrated bands but the reference has {}",
            bands,
            reference.len()
        )));
    }

    debug!("Computing reflectance for {} bands x {} rows x {} columns", bands, rows, cols);
    Ok(Array3::from_shape_fn((bands, rows, cols), |(b, r, c)| {
        (raw.dn(r, c, b) / reference[b]) as f32
    }))
}

pub fn count_non_finite(reflectance: &Array3<f32>) -> usize {
    reflectance.iter().filter(|v| !v.is_finite()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn identity_coefficients(bands: usize) -> CalibrationCoefficients {
        CalibrationCoefficients {
            band_match_index: (0..bands).collect(),
            gain: Array1::ones(bands),
            bias: Array1::zeros(bands),
        }
    }

    #[test]
    fn test_reference_gain_and_bias() {
        let coefficients = CalibrationCoefficients {
            band_match_index: vec![2, 0, 1],
            gain: array![2.0, 3.0, 0.5],
            bias: array![1.0, 0.0, -1.0],
        };
        let mean = array![10.0, 20.0, 30.0];

        let reference = compute_reference(CameraGeneration::VnirNew, &mean, &coefficients).unwrap();
        // projected = [30, 10, 20]
        assert_eq!(reference, array![61.0, 30.0, 9.0]);
    }

    #[test]
    fn test_hand_computed_reflectance() {
        let raw = Array3::from_shape_fn((2, 2, 3), |(r, c, b)| (10 * (r * 2 + c) + b + 1) as f32);
        let coefficients = CalibrationCoefficients {
            band_match_index: vec![0, 1, 2],
            gain: array![1.0, 2.0, 4.0],
            bias: array![0.0, 1.0, 2.0],
        };
        let mean = array![2.0, 1.5, 0.5];

        let reference = compute_reference(CameraGeneration::SwirNew, &mean, &coefficients).unwrap();
        assert_eq!(reference, array![2.0, 4.0, 4.0]);

        let rfl = compute_reflectance(&raw, &reference, CameraGeneration::SwirNew).unwrap();
        assert_eq!(rfl.dim(), (3, 2, 2));
        for r in 0..2 {
            for c in 0..2 {
                for b in 0..3 {
                    let expected = raw[[r, c, b]] / reference[b] as f32;
                    assert_eq!(rfl[[b, r, c]], expected);
                }
            }
        }
        // pixel (1, 0), band 2: raw 23 / 4
        assert_eq!(rfl[[2, 1, 0]], 5.75);
    }

    #[test]
    fn test_uniform_scene() {
        let raw = Array3::from_elem((2, 2, 3), 4.0f32);
        let reference = compute_reference(
            CameraGeneration::VnirNew,
            &array![2.0, 2.0, 2.0],
            &identity_coefficients(3),
        )
        .unwrap();
        assert_eq!(reference, array![2.0, 2.0, 2.0]);

        let rfl = compute_reflectance(&raw, &reference, CameraGeneration::VnirNew).unwrap();
        assert!(rfl.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_legacy_truncation() {
        let bands = 700;
        let mean = Array1::from_elem(bands, 1.0);
        let coefficients = CalibrationCoefficients {
            band_match_index: (0..bands).collect(),
            gain: Array1::ones(679),
            bias: Array1::zeros(679),
        };
        let reference = compute_reference(CameraGeneration::VnirOld, &mean, &coefficients).unwrap();
        assert_eq!(reference.len(), 679);

        let raw = Array3::from_elem((1, 2, bands), 3.0f32);
        let rfl = compute_reflectance(&raw, &reference, CameraGeneration::VnirOld).unwrap();
        assert_eq!(rfl.dim(), (679, 1, 2));
        assert_eq!(effective_band_count(CameraGeneration::VnirMiddle, 939), 662);
    }

    #[test]
    fn test_zero_reference_propagates_non_finite() {
        let raw = Array3::from_elem((1, 1, 2), 5.0f32);
        let rfl = compute_reflectance(&raw, &array![0.0, 1.0], CameraGeneration::VnirNew).unwrap();
        assert!(rfl[[0, 0, 0]].is_infinite());
        assert_eq!(rfl[[1, 0, 0]], 5.0);
        assert_eq!(count_non_finite(&rfl), 1);
    }

    #[test]
    fn test_index_outside_spectrum() {
        let coefficients = CalibrationCoefficients {
            band_match_index: vec![0, 5],
            gain: Array1::ones(2),
            bias: Array1::zeros(2),
        };
        let result = compute_reference(CameraGeneration::VnirNew, &array![1.0, 2.0], &coefficients);
        assert!(matches!(result, Err(CalibrationError::InvalidReferenceData(_))));
    }

    #[test]
    fn test_band_count_mismatch() {
        let raw = Array3::from_elem((1, 1, 4), 1.0f32);
        let result = compute_reflectance(&raw, &array![1.0, 1.0, 1.0], CameraGeneration::VnirNew);
        assert!(matches!(result, Err(CalibrationError::InvalidReferenceData(_))));
    }
}
