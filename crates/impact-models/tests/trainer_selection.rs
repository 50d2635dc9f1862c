//! Best-of-N selection over the candidate lists.

mod common;

use impact_models::config::{ModelConfig, TrainingConfig};
use impact_models::data_handling::{train_test_split, RegressionTarget};
use impact_models::trainer::{train_classifiers, train_regressors, SplitData};
use ndarray::{Array2, Axis};

struct Fixture {
    names: Vec<String>,
    x_train: Array2<f64>,
    x_test: Array2<f64>,
    y_train: Vec<usize>,
    y_test: Vec<usize>,
    r_train: [Vec<f64>; 4],
    r_test: [Vec<f64>; 4],
}

impl Fixture {
    fn new(n: usize) -> Self {
        let events: Vec<[f64; 4]> = (0..n).map(common::event).collect();
        let x = Array2::from_shape_fn((n, 4), |(i, j)| events[i][j]);
        let split = train_test_split(n, 0.25, 42).unwrap();

        let class_of = |f: &[f64; 4]| match common::impact_rank(f) {
            "high" => 0,
            "low" => 1,
            _ => 2,
        };
        let labels = |rows: &[usize]| rows.iter().map(|&i| class_of(&events[i])).collect();
        let numeric = |rows: &[usize]| {
            std::array::from_fn(|k| rows.iter().map(|&i| common::outcomes(&events[i])[k]).collect())
        };

        Self {
            names: common::FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            x_train: x.select(Axis(0), &split.train),
            x_test: x.select(Axis(0), &split.test),
            y_train: labels(&split.train),
            y_test: labels(&split.test),
            r_train: numeric(&split.train),
            r_test: numeric(&split.test),
        }
    }

    fn split(&self) -> SplitData<'_> {
        SplitData {
            feature_names: &self.names,
            x_train: &self.x_train,
            x_test: &self.x_test,
        }
    }
}

#[test]
fn equal_f1_keeps_the_earlier_candidate() {
    let fixture = Fixture::new(60);
    let config = TrainingConfig {
        classifiers: vec![
            ModelConfig::new("FirstTree", "decision_tree".parse().unwrap()),
            ModelConfig::new("SecondTree", "decision_tree".parse().unwrap()),
        ],
        ..common::fast_config()
    };

    let outcome =
        train_classifiers(&config, fixture.split(), &fixture.y_train, &fixture.y_test, 3).unwrap();
    let first = outcome.report.get("FirstTree").unwrap();
    let second = outcome.report.get("SecondTree").unwrap();
    assert_eq!(first.f1_macro, second.f1_macro);
    assert_eq!(outcome.best.variant, "FirstTree");
}

#[test]
fn classifier_winner_has_the_best_f1() {
    let fixture = Fixture::new(80);
    let config = common::fast_config();
    let outcome =
        train_classifiers(&config, fixture.split(), &fixture.y_train, &fixture.y_test, 3).unwrap();

    let names: Vec<&str> = outcome.report.entries().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["LogisticRegression", "DecisionTree", "RandomForest", "GradientBoosting"]
    );
    for (_, metrics) in outcome.report.entries() {
        assert!(outcome.best.f1_macro >= metrics.f1_macro);
    }
    assert_eq!(outcome.best.feature_names, fixture.names);
}

#[test]
fn regressor_winner_has_the_lowest_rmse_per_target() {
    let fixture = Fixture::new(80);
    let config = common::fast_config();
    let outcome = train_regressors(&config, fixture.split(), &fixture.r_train, &fixture.r_test).unwrap();

    assert_eq!(outcome.best.len(), 4);
    for (target, artifact) in RegressionTarget::ALL.iter().zip(&outcome.best) {
        assert_eq!(artifact.target, *target);
        let report = outcome.report.target(*target).unwrap();
        assert_eq!(report.len(), 3);
        for (_, metrics) in report.entries() {
            assert!(artifact.rmse <= metrics.rmse);
        }
        assert_eq!(report.get(&artifact.variant).unwrap().rmse, artifact.rmse);
    }
}

#[test]
fn regression_report_is_keyed_by_target_column() {
    let fixture = Fixture::new(40);
    let config = TrainingConfig {
        regressors: vec![ModelConfig::new("DecisionTree", "tree".parse().unwrap())],
        ..common::fast_config()
    };
    let outcome = train_regressors(&config, fixture.split(), &fixture.r_train, &fixture.r_test).unwrap();

    let json: serde_json::Value = serde_json::to_value(&outcome.report).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
    for target in RegressionTarget::ALL {
        assert!(json[target.column()]["DecisionTree"]["rmse"].is_number());
        assert!(json[target.column()]["DecisionTree"]["mae"].is_number());
    }
}

#[test]
fn logistic_regression_among_regressors_is_an_error() {
    let fixture = Fixture::new(20);
    let config = TrainingConfig {
        regressors: vec![ModelConfig::new("Logistic", "logistic".parse().unwrap())],
        ..common::fast_config()
    };
    assert!(train_regressors(&config, fixture.split(), &fixture.r_train, &fixture.r_test).is_err());
}
