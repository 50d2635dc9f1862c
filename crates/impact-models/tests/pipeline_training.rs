//! End-to-end training runs against a scratch install root.

mod common;

use std::path::Path;

use impact_models::config::{PipelinePaths, TrainingConfig};
use impact_models::data_handling::{FeatureTable, RegressionTarget};
use impact_models::error::ImpactError;
use impact_models::models::Regressor;
use impact_models::pipeline::{
    CLASSIFICATION_METRICS_FILE, REGRESSION_METRICS_FILE, TRAINING_REPORT_FILE,
};
use impact_models::{load_models, predict_full_package, run_training, ModelStore};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_five_events(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("features.csv"),
        "event_id,magnitude,is_urban\n\
         1,0.1,0\n\
         2,0.2,0\n\
         3,0.9,1\n\
         4,0.5,0\n\
         5,0.95,1\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("targets.csv"),
        "event_id,impact_rank,total_population_affected,total_fatalities,total_injuries,total_socio_economic_loss\n\
         1,low,0,0,0,0\n\
         2,low,0,0,0,0\n\
         3,high,100,100,100,100\n\
         4,medium,10,10,10,10\n\
         5,high,100,100,100,100\n",
    )
    .unwrap();
}

#[test]
fn five_event_run_recovers_training_labels() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::resolve(root.path(), None, None, None);
    write_five_events(&paths.data_dir);

    let summary = run_training(&paths, &TrainingConfig::default()).unwrap();
    assert_eq!(summary.regression_winners.len(), 4);

    let models = load_models(&ModelStore::new(&paths.model_dir)).unwrap();
    let features = FeatureTable::from_row(&[("magnitude", 0.1), ("is_urban", 0.0)]);
    assert_eq!(models.feature_names(), &["magnitude", "is_urban"]);
    assert!(!predict_full_package(Some(&models), &features)[0].is_error());

    let table = impact_models::io::read_feature_csv(
        paths.features_path(),
        &impact_models::io::TableReaderConfig::default(),
    )
    .unwrap();
    let results = predict_full_package(Some(&models), &table);
    assert_eq!(results.len(), 5);

    let expected = ["low", "low", "high", "medium", "high"];
    let correct = results
        .iter()
        .zip(expected)
        .filter(|(r, label)| r.package().unwrap().classification.rank == *label)
        .count();
    assert!(correct >= 3, "only {} of 5 labels recovered", correct);

    let x = table.align_to(models.feature_names()).unwrap();
    for artifact in &models.regressors {
        let winner = artifact.model.predict(&x).unwrap();
        for (result, value) in results.iter().zip(winner) {
            let predicted = result.package().unwrap().regression_predictions.get(artifact.target);
            assert!(predicted >= 0.0, "{} predicted {}", artifact.target, predicted);
            assert_eq!(predicted, value);
        }
    }
}

#[test]
fn missing_features_file_halts_before_any_write() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::resolve(root.path(), None, None, None);
    common::write_dataset(&paths.data_dir, 10);
    std::fs::remove_file(paths.features_path()).unwrap();

    let err = run_training(&paths, &common::fast_config()).unwrap_err();
    assert!(matches!(err, ImpactError::DataNotFound { .. }));
    assert!(!paths.model_dir.exists());
    assert!(!paths.reports_dir.exists());
}

#[test]
fn failed_run_keeps_previous_models_usable() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::resolve(root.path(), None, None, None);
    common::write_dataset(&paths.data_dir, 40);
    run_training(&paths, &common::fast_config()).unwrap();

    let table = impact_models::io::read_feature_csv(
        paths.features_path(),
        &impact_models::io::TableReaderConfig::default(),
    )
    .unwrap();
    let store = ModelStore::new(&paths.model_dir);
    let before = predict_full_package(Some(&load_models(&store).unwrap()), &table);
    assert!(before.iter().all(|r| !r.is_error()));
    let encoder_before = std::fs::read(paths.model_dir.join("label_encoder.json")).unwrap();
    let classifier_before =
        std::fs::read(paths.model_dir.join("best_classification_model.json")).unwrap();

    // one event with an unseen label: encoding succeeds, the split does not
    std::fs::write(
        paths.features_path(),
        format!("event_id,GEOID,{}\n0,06000,0.5,12,1,0.3\n", common::FEATURE_NAMES.join(",")),
    )
    .unwrap();
    std::fs::write(
        paths.targets_path(),
        "event_id,impact_rank,total_population_affected,total_fatalities,total_injuries,total_socio_economic_loss\n\
         0,aaa,1,1,1,1\n",
    )
    .unwrap();
    let err = run_training(&paths, &common::fast_config()).unwrap_err();
    assert!(matches!(err, ImpactError::InsufficientData(_)), "{err}");

    assert_eq!(
        std::fs::read(paths.model_dir.join("label_encoder.json")).unwrap(),
        encoder_before
    );
    assert_eq!(
        std::fs::read(paths.model_dir.join("best_classification_model.json")).unwrap(),
        classifier_before
    );
    let after = predict_full_package(Some(&load_models(&store).unwrap()), &table);
    assert_eq!(after, before);
}

#[test]
fn training_writes_every_artifact() {
    init_logger();
    let root = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::resolve(root.path(), None, None, None);
    common::write_dataset(&paths.data_dir, 60);

    let summary = run_training(&paths, &common::fast_config()).unwrap();

    for name in ["best_classification_model.json", "label_encoder.json"] {
        assert!(paths.model_dir.join(name).is_file(), "missing {}", name);
    }
    for target in RegressionTarget::ALL {
        let name = format!("best_regression_model_{}.json", target.column());
        assert!(paths.model_dir.join(&name).is_file(), "missing {}", name);
    }

    let metrics: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.metrics_dir().join(CLASSIFICATION_METRICS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(metrics.as_object().unwrap().len(), 4);
    assert!(metrics[&summary.classification_winner]["f1_macro"].is_number());

    let regression: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.metrics_dir().join(REGRESSION_METRICS_FILE)).unwrap(),
    )
    .unwrap();
    assert!(regression["total_fatalities"]["GradientBoosting"]["rmse"].is_number());

    for figure in &summary.figures {
        assert!(figure.starts_with(paths.figures_dir()));
        assert!(std::fs::read_to_string(figure).unwrap().contains("plotly"));
    }
    let report = summary.report.unwrap();
    assert_eq!(report, paths.reports_dir.join(TRAINING_REPORT_FILE));
    let html = std::fs::read_to_string(report).unwrap();
    assert!(html.contains("Classification"));
    assert!(html.contains("total_socio_economic_loss"));
}

#[test]
fn report_can_be_disabled() {
    let root = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::resolve(root.path(), None, None, None);
    common::write_dataset(&paths.data_dir, 30);
    let config = TrainingConfig {
        write_report: false,
        ..common::fast_config()
    };

    let summary = run_training(&paths, &config).unwrap();
    assert!(summary.report.is_none());
    assert!(!paths.reports_dir.join(TRAINING_REPORT_FILE).exists());
}
