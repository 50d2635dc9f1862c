pub mod input;

use anyhow::{Context, Result};

use impact_models::{run_training, TrainingSummary};

use crate::train::input::TrainArgs;

pub fn run(args: &TrainArgs) -> Result<TrainingSummary> {
    log::info!("Starting model training pipeline");
    let start_time = std::time::Instant::now();
    let summary = run_training(&args.paths, &args.config)
        .with_context(|| "Training failed: an error occurred during the training pipeline")?;
    log::info!("Training completed in {:?}", start_time.elapsed());
    log::info!("Best classifier: {}", summary.classification_winner);
    for (target, variant) in &summary.regression_winners {
        log::info!("Best regressor for {}: {}", target, variant);
    }
    if let Some(report) = &summary.report {
        log::info!("Report: {}", report.display());
    }
    Ok(summary)
}
