//! End-to-end training run: load, fit, select, persist, explain, report.

use std::path::PathBuf;

use maud::{html, Markup};
use ndarray::{Array2, Axis};

use crate::config::{PipelinePaths, TrainingConfig};
use crate::data_handling::{sample_rows, train_test_split, Dataset, RegressionTarget};
use crate::error::{ImpactError, Result};
use crate::explain::TreeExplainer;
use crate::io::load_dataset;
use crate::preprocessing::LabelEncoder;
use crate::report::plots::plot_shap_summary;
use crate::report::{Report, ReportSection};
use crate::stats::{ClassificationMetrics, RegressionMetrics};
use crate::store::{save_metrics, EncoderArtifact, ModelStore};
use crate::trainer::{
    train_classifiers, train_regressors, ClassificationOutcome, MetricsReport, RegressionOutcome,
    SplitData,
};

pub const CLASSIFICATION_METRICS_FILE: &str = "classification_metrics.json";
pub const REGRESSION_METRICS_FILE: &str = "regression_metrics.json";
pub const CLASSIFICATION_SHAP_FILE: &str = "shap_plot_classification.html";
pub const FATALITIES_SHAP_FILE: &str = "shap_plot_regression_fatalities.html";
pub const TRAINING_REPORT_FILE: &str = "training_report.html";

/// What a completed training run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub classification_winner: String,
    /// `(target, winning variant)` in target order.
    pub regression_winners: Vec<(RegressionTarget, String)>,
    pub figures: Vec<PathBuf>,
    pub report: Option<PathBuf>,
}

/// An attribution summary produced during training.
struct ShapFigure {
    title: String,
    plot: plotly::Plot,
    path: PathBuf,
}

/// Run the full training pipeline.
///
/// Missing input tables stop the run before any output directory is created.
/// Models and the label encoder are written only after every fit succeeds.
pub fn run_training(paths: &PipelinePaths, config: &TrainingConfig) -> Result<TrainingSummary> {
    config.validate()?;
    let dataset = load_dataset(paths)?;
    paths.ensure_output_dirs()?;
    let store = ModelStore::new(&paths.model_dir);

    let encoder = LabelEncoder::fit(&dataset.targets.impact_rank);
    log::info!("Severity classes: {:?}", encoder.classes());
    let y_all = encoder.transform(&dataset.targets.impact_rank)?;

    let split = train_test_split(dataset.features.nrows(), config.test_size, config.random_state)?;
    let x_train = dataset.features.x.select(Axis(0), &split.train);
    let x_test = dataset.features.x.select(Axis(0), &split.test);
    let data = SplitData {
        feature_names: &dataset.features.names,
        x_train: &x_train,
        x_test: &x_test,
    };

    let y_train: Vec<usize> = split.train.iter().map(|&i| y_all[i]).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| y_all[i]).collect();
    let classification = train_classifiers(config, data, &y_train, &y_test, encoder.n_classes())?;

    let train_targets = dataset.targets.select_rows(&split.train);
    let test_targets = dataset.targets.select_rows(&split.test);
    let regression = train_regressors(config, data, &train_targets.numeric, &test_targets.numeric)?;

    // Nothing is persisted until every model has been fitted, so a failed run
    // leaves the previous classifier and encoder pair in place.
    save_metrics(&paths.metrics_dir(), CLASSIFICATION_METRICS_FILE, &classification.report)?;
    save_metrics(&paths.metrics_dir(), REGRESSION_METRICS_FILE, &regression.report)?;
    store.save(&classification.best)?;
    store.save(&EncoderArtifact {
        encoder: encoder.clone(),
    })?;
    for artifact in &regression.best {
        store.save(artifact)?;
    }

    let sample = sample_rows(x_train.nrows(), config.explain_sample_size, config.random_state);
    let x_sample = x_train.select(Axis(0), &sample);
    let figures = explain_winners(
        paths,
        &dataset.features.names,
        encoder.classes(),
        &classification,
        &regression,
        &x_sample,
    )?;

    let report = if config.write_report {
        let report = training_report(
            config,
            &dataset,
            &split.train,
            &split.test,
            &classification,
            &regression,
            &figures,
        )?;
        let path = paths.reports_dir.join(TRAINING_REPORT_FILE);
        report.save_to_file(&path)?;
        Some(path)
    } else {
        None
    };

    log::info!("Training pipeline finished");
    Ok(TrainingSummary {
        classification_winner: classification.best.variant.clone(),
        regression_winners: regression
            .best
            .iter()
            .map(|a| (a.target, a.variant.clone()))
            .collect(),
        figures: figures.into_iter().map(|f| f.path).collect(),
        report,
    })
}

/// Write attribution summaries for the classifier and the fatalities regressor.
/// A winner without tree structure is skipped with a warning.
fn explain_winners(
    paths: &PipelinePaths,
    feature_names: &[String],
    class_names: &[String],
    classification: &ClassificationOutcome,
    regression: &RegressionOutcome,
    x_sample: &Array2<f64>,
) -> Result<Vec<ShapFigure>> {
    let mut figures = Vec::new();

    log::info!("Generating SHAP summary for classification model");
    match TreeExplainer::for_classifier(&classification.best.model) {
        Ok(explainer) => {
            let attributions = explainer.explain(x_sample)?;
            let title = format!("SHAP Summary: {} (impact_rank)", classification.best.variant);
            let plot = plot_shap_summary(feature_names, class_names, &attributions, &title);
            let path = paths.figures_dir().join(CLASSIFICATION_SHAP_FILE);
            write_plot(&plot, &path)?;
            figures.push(ShapFigure { title, plot, path });
        }
        Err(e) => log::warn!("Could not create SHAP explainer for classification model: {}", e),
    }

    if let Some(fatalities) = regression.winner(RegressionTarget::TotalFatalities) {
        log::info!("Generating SHAP summary for total_fatalities regression model");
        match TreeExplainer::for_regressor(&fatalities.model) {
            Ok(explainer) => {
                let attributions = explainer.explain(x_sample)?;
                let title = format!("SHAP Summary: {} (total_fatalities)", fatalities.variant);
                let outputs = vec![RegressionTarget::TotalFatalities.column().to_string()];
                let plot = plot_shap_summary(feature_names, &outputs, &attributions, &title);
                let path = paths.figures_dir().join(FATALITIES_SHAP_FILE);
                write_plot(&plot, &path)?;
                figures.push(ShapFigure { title, plot, path });
            }
            Err(e) => log::warn!("Could not create SHAP explainer for regression model: {}", e),
        }
    }

    Ok(figures)
}

fn write_plot(plot: &plotly::Plot, path: &std::path::Path) -> Result<()> {
    std::fs::write(path, plot.to_html()).map_err(|source| ImpactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("SHAP plot saved to {}", path.display());
    Ok(())
}

fn metrics_table<M>(
    report: &MetricsReport<M>,
    winner: &str,
    columns: &[&str],
    row: impl Fn(&M) -> Vec<f64>,
) -> Markup {
    html! {
        table {
            thead {
                tr {
                    th { "Model" }
                    @for c in columns { th { (c) } }
                }
            }
            tbody {
                @for (name, metrics) in report.entries() {
                    tr class=[(name == winner).then_some("winner")] {
                        td { (name) }
                        @for v in row(metrics) { td { (format!("{:.4}", v)) } }
                    }
                }
            }
        }
    }
}

fn training_report(
    config: &TrainingConfig,
    dataset: &Dataset,
    train_rows: &[usize],
    test_rows: &[usize],
    classification: &ClassificationOutcome,
    regression: &RegressionOutcome,
    figures: &[ShapFigure],
) -> Result<Report> {
    let mut report = Report::new(
        "impact",
        env!("CARGO_PKG_VERSION"),
        "Disaster Impact Model Training Report",
    );

    /* Section 1: Overview */
    {
        let mut overview = ReportSection::new("Overview");
        overview.add_content(html! {
            p {
                "Trained on " (train_rows.len()) " of " (dataset.features.nrows())
                " events (" (test_rows.len()) " held out) with "
                (dataset.features.names.len()) " features."
            }
            ul {
                li { "Severity classifier: " b { (classification.best.variant) } }
                @for artifact in &regression.best {
                    li { (artifact.target.column()) ": " b { (artifact.variant) } }
                }
            }
        });
        report.add_section(overview);
    }

    /* Section 2: Classification */
    {
        let mut section = ReportSection::new("Classification");
        section.add_content(metrics_table(
            &classification.report,
            &classification.best.variant,
            &["Accuracy", "Precision (macro)", "Recall (macro)", "F1 (macro)"],
            |m: &ClassificationMetrics| vec![m.accuracy, m.precision_macro, m.recall_macro, m.f1_macro],
        ));
        report.add_section(section);
    }

    /* Section 3: Regression */
    {
        let mut section = ReportSection::new("Regression");
        for (target, target_report) in regression.report.entries() {
            let winner = regression
                .winner(*target)
                .map(|a| a.variant.as_str())
                .unwrap_or("");
            section.add_content(html! { h3 { (target.column()) } });
            section.add_content(metrics_table(
                target_report,
                winner,
                &["MAE", "RMSE"],
                |m: &RegressionMetrics| vec![m.mae, m.rmse],
            ));
        }
        report.add_section(section);
    }

    /* Section 4: Explainability */
    {
        let mut section = ReportSection::new("Explainability");
        if figures.is_empty() {
            section.add_content(html! { p { "No tree-based winner; attribution summaries were skipped." } });
        }
        for figure in figures {
            section.add_content(html! { h3 { (figure.title) } });
            section.add_plot(figure.plot.clone());
        }
        report.add_section(section);
    }

    /* Section 5: Configuration */
    {
        let mut section = ReportSection::new("Configuration");
        section.add_content(html! {
            pre {
                code { (serde_json::to_string_pretty(config)?) }
            }
        });
        report.add_section(section);
    }

    Ok(report)
}
