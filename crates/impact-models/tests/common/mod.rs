//! Synthetic disaster events shared by the integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::Path;

use impact_models::config::{MaxFeatures, ModelConfig, ModelType, TrainingConfig};

pub const FEATURE_NAMES: [&str; 4] = ["magnitude", "duration_hours", "is_urban", "preparedness_index"];

/// Deterministic features for event `i`.
pub fn event(i: usize) -> [f64; 4] {
    [
        ((i * 37) % 100) as f64 / 100.0,
        ((i * 13) % 50) as f64,
        (i % 2) as f64,
        ((i * 7) % 10) as f64 / 10.0,
    ]
}

pub fn impact_rank(features: &[f64; 4]) -> &'static str {
    if features[0] > 0.66 {
        "high"
    } else if features[0] > 0.33 {
        "medium"
    } else {
        "low"
    }
}

/// `(population, fatalities, injuries, loss)` for an event.
pub fn outcomes(f: &[f64; 4]) -> [f64; 4] {
    let fatalities = (5.0 * f[0] * (1.0 + f[2])).round();
    [
        1000.0 * f[0] + 10.0 * f[1],
        fatalities,
        3.0 * fatalities + f[1] / 10.0,
        1.0e6 * f[0] * (1.0 - f[3]),
    ]
}

/// Write `features.csv` (with identifier columns) and `targets.csv` for `n` events.
pub fn write_dataset(dir: &Path, n: usize) {
    std::fs::create_dir_all(dir).unwrap();
    let mut features = format!("event_id,GEOID,{}\n", FEATURE_NAMES.join(","));
    let mut targets = String::from(
        "event_id,impact_rank,total_population_affected,total_fatalities,total_injuries,total_socio_economic_loss\n",
    );
    for i in 0..n {
        let f = event(i);
        writeln!(features, "{},{:05},{},{},{},{}", i, 6000 + i, f[0], f[1], f[2], f[3]).unwrap();
        let o = outcomes(&f);
        writeln!(targets, "{},{},{},{},{},{}", i, impact_rank(&f), o[0], o[1], o[2], o[3]).unwrap();
    }
    std::fs::write(dir.join("features.csv"), features).unwrap();
    std::fs::write(dir.join("targets.csv"), targets).unwrap();
}

/// Default candidate families with small ensembles so tests stay quick.
pub fn fast_config() -> TrainingConfig {
    let boosting = ModelType::GradientBoosting {
        n_estimators: 15,
        learning_rate: 0.3,
        max_depth: 3,
        min_samples_leaf: 1,
        subsample: 1.0,
    };
    TrainingConfig {
        classifiers: vec![
            ModelConfig::new(
                "LogisticRegression",
                ModelType::LogisticRegression {
                    learning_rate: 0.1,
                    max_iter: 200,
                    l2_penalty: 1e-3,
                },
            ),
            ModelConfig::new("DecisionTree", "decision_tree".parse().unwrap()),
            ModelConfig::new("RandomForest", forest(MaxFeatures::Sqrt)),
            ModelConfig::new("GradientBoosting", boosting.clone()),
        ],
        regressors: vec![
            ModelConfig::new("DecisionTree", "decision_tree".parse().unwrap()),
            ModelConfig::new("RandomForest", forest(MaxFeatures::All)),
            ModelConfig::new("GradientBoosting", boosting),
        ],
        ..TrainingConfig::default()
    }
}

pub fn forest(max_features: MaxFeatures) -> ModelType {
    ModelType::RandomForest {
        n_estimators: 10,
        max_depth: None,
        min_samples_leaf: 1,
        max_features,
        bootstrap: true,
    }
}
