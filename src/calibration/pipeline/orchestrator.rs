use std::path::PathBuf;

use ndarray::Array3;
use tracing::{error, info, instrument, warn};

use crate::calibration::{
    array_file::{ArrayFileWriter, NetcdfRewriter},
    coefficients::{
        CoefficientProvider, NpyCoefficientStore, compute_reference, compute_reflectance,
        count_non_finite,
    },
    common::error::{CalibrationError, Result},
    irradiance::{
        self,
        matcher::{image_time_of_day, mean_spectrum},
    },
    pipeline::{
        timing::{PipelineTimings, Timer},
        types::{CalibrationConfig, CalibrationJob, CalibrationStage},
    },
    profile::{self, CameraProfile},
    raw::{EnviReader, RawCubeReader, SpectralCube, bands_first},
};

pub struct CalibrationPipeline<R: RawCubeReader, P: CoefficientProvider, W: ArrayFileWriter> {
    reader: R,
    provider: P,
    writer: W,
    config: CalibrationConfig,
}

impl CalibrationPipeline<EnviReader, NpyCoefficientStore, NetcdfRewriter> {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            reader: EnviReader,
            provider: NpyCoefficientStore::new(config.calibration_root.clone()),
            writer: NetcdfRewriter::new(config.missing_reflectance),
            config,
        }
    }
}

/// Runs `f` as `stage`, recording its duration and logging a failure with the
/// stage it came from.
fn timed<T>(
    timings: &mut PipelineTimings,
    stage: CalibrationStage,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let _span = tracing::info_span!("stage", name = stage.name()).entered();
    let timer = Timer::start(stage);
    let result = f();
    let (stage, duration) = timer.stop();
    timings.add_step(stage, duration);

    if let Err(e) = &result {
        error!(stage = stage.name(), kind = e.kind(), "Calibration failed: {}", e);
    }
    result
}

impl<R: RawCubeReader, P: CoefficientProvider, W: ArrayFileWriter> CalibrationPipeline<R, P, W> {
    pub fn with_custom(reader: R, provider: P, writer: W, config: CalibrationConfig) -> Self {
        Self {
            reader,
            provider,
            writer,
            config,
        }
    }

    /// Calibrates `job.raw_path` and returns the path of the rewritten file.
    pub fn calibrate(&self, job: &CalibrationJob) -> Result<PathBuf> {
        self.calibrate_with_timings(job)?;
        Ok(job.output.clone())
    }

    #[instrument(skip(self, job), fields(raw = %job.raw_path.display(), sensor = %job.sensor))]
    pub fn calibrate_with_timings(&self, job: &CalibrationJob) -> Result<PipelineTimings> {
        let mut timings = PipelineTimings::new();
        info!("Starting calibration of {}", job.raw_path.display());

        let profile = timed(&mut timings, CalibrationStage::ResolveProfile, || {
            let profile = profile::resolve(job.sensor, job.data_date);
            info!("Camera generation: {}", profile.generation);
            Ok(profile)
        })?;
        let generation = profile.generation;

        let raw = timed(&mut timings, CalibrationStage::LoadRaw, || {
            self.reader.open(&job.raw_path)
        })?;

        let payload = match profile.window_size().filter(|_| profile.requires_calibration()) {
            Some(window_size) => timed(&mut timings, CalibrationStage::CalibrationPath, || {
                self.reflectance(job, &profile, window_size, &raw)
            })?,
            None => timed(&mut timings, CalibrationStage::NoCalibrationPath, || {
                info!("No calibration model for {}, writing raw data", generation);
                Ok(bands_first(&raw))
            })?,
        };
        drop(raw);

        timed(&mut timings, CalibrationStage::Rewrite, || {
            self.writer.rewrite(&job.template, &job.output, &payload, generation)
        })?;
        drop(payload);

        info!(
            stage = CalibrationStage::Done.name(),
            "Calibration complete: {} in {:.3}ms",
            job.output.display(),
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(timings)
    }

    fn reflectance<C: SpectralCube>(
        &self,
        job: &CalibrationJob,
        profile: &CameraProfile,
        window_size: usize,
        raw: &C,
    ) -> Result<Array3<f32>> {
        let generation = profile.generation;
        let image_time = image_time_of_day(&job.timestamp)?;

        let series = irradiance::read_folder(generation, &job.environment_logger)?;
        if series.is_empty() {
            return Err(CalibrationError::EmptySeries(format!(
                "no readings in '{}'",
                job.environment_logger.display()
            )));
        }
        if let Some(expected) = profile.irradiance_band_count {
            if series.band_count() != expected {
                warn!(
                    "Irradiance spectra have {} bands, {} expects {}",
                    series.band_count(),
                    generation,
                    expected
                );
            }
        }

        let spectrum = mean_spectrum(image_time, &series, window_size)?;
        drop(series);

        let coefficients = self.provider.load(generation)?;
        let reference = compute_reference(generation, &spectrum, &coefficients)?;
        let reflectance = compute_reflectance(raw, &reference, generation)?;
        self.check_finite(&reflectance)?;
        Ok(reflectance)
    }

    fn check_finite(&self, reflectance: &Array3<f32>) -> Result<()> {
        let count = count_non_finite(reflectance);
        if count == 0 {
            return Ok(());
        }
        if self.config.validate_finite {
            return Err(CalibrationError::ArithmeticAnomaly {
                count,
                total: reflectance.len(),
            });
        }
        warn!(
            "Reflectance has {} non-finite values out of {}",
            count,
            reflectance.len()
        );
        Ok(())
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }
}
