use anyhow::{Context, Result};
use terra_hyperspectral_rs::calibration::transform::perform_process;
use terra_hyperspectral_rs::calibration::{
    CalibrationConfig, CalibrationPipeline, SystemMemory, TransformRequest,
};
use terra_hyperspectral_rs::logger;

use tracing::{error, info};

fn main() -> Result<()> {
    logger::init();

    let request_path = std::env::args()
        .nth(1)
        .context("usage: terra_hyperspectral_rs <request.json>")?;

    info!("Starting hyperspectral calibration...");
    let request = TransformRequest::from_file(&request_path)
        .with_context(|| format!("reading transform request {}", request_path))?;

    let config = CalibrationConfig::default();
    info!("Calibration root: {}", config.calibration_root.display());
    let pipeline = CalibrationPipeline::new(config);

    let result = perform_process(&request, &pipeline, &SystemMemory);
    if result.is_success() {
        info!("Calibration successful!");
    } else {
        error!("Calibration failed with code {}", result.code);
    }

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
