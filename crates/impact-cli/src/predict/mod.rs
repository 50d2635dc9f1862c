pub mod input;

use anyhow::{Context, Result};

use impact_models::data_handling::FeatureTable;
use impact_models::io::{read_feature_csv, TableReaderConfig};
use impact_models::{load_models, predict_full_package, ModelStore, PredictionResult};

use crate::predict::input::PredictArgs;
use crate::util::write_bytes_to_file;

/// A single flood event used when no input file is given.
pub const SAMPLE_EVENT: [(&str, f64); 14] = [
    ("disaster_type_flood", 1.0),
    ("disaster_type_wind", 0.0),
    ("magnitude_normalized", 0.85),
    ("duration_hours", 12.5),
    ("season_month", 6.0),
    ("season_quarter", 2.0),
    ("is_urban", 1.0),
    ("population_density_log", 5.1),
    ("gdp_per_capita_normalized", 0.75),
    ("historical_disaster_frequency", 5.0),
    ("preparedness_index", 0.6),
    ("early_warning_system_level", 1.0),
    ("healthcare_access_index", 0.8),
    ("past_response_time_hours", 4.5),
];

pub fn sample_features() -> FeatureTable {
    FeatureTable::from_row(&SAMPLE_EVENT)
}

/// Load the stored models and predict for the input rows.
///
/// Missing models do not fail the command: they come back as an error entry
/// in the results, like any other prediction failure.
pub fn run(args: &PredictArgs) -> Result<Vec<PredictionResult>> {
    let features = match &args.input {
        Some(path) => read_feature_csv(path, &TableReaderConfig::default())
            .with_context(|| format!("Failed to read input features: {:?}", path))?,
        None => {
            log::info!("No input file given; predicting for the built-in sample event");
            sample_features()
        }
    };

    let store = ModelStore::new(&args.paths.model_dir);
    let models = match load_models(&store) {
        Ok(models) => Some(models),
        Err(e) => {
            log::error!("{}", e);
            None
        }
    };

    let results = predict_full_package(models.as_ref(), &features);
    let json = serde_json::to_vec_pretty(&results)?;
    match &args.output {
        Some(path) => {
            write_bytes_to_file(path, &json)
                .with_context(|| format!("Failed to write predictions to {:?}", path))?;
            log::info!("Predictions written to {}", path.display());
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(results)
}
