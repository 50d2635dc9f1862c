use plotly::common::{Mode, Orientation};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot, Scatter};

use crate::explain::Attributions;

/// Features ordered by ascending mean |attribution|, so the most important
/// feature is drawn at the top of a horizontal chart.
fn features_by_importance(feature_names: &[String], attributions: &Attributions) -> Vec<usize> {
    let importance = attributions.mean_abs();
    let mut order: Vec<usize> = (0..feature_names.len()).collect();
    order.sort_by(|&a, &b| importance[a].total_cmp(&importance[b]));
    order
}

/// Attribution summary plot.
///
/// Single-output models get one marker per (row, feature) attribution, like a
/// beeswarm. Multi-output models get a horizontal bar of mean |attribution|
/// per feature, stacked by output.
pub fn plot_shap_summary(
    feature_names: &[String],
    output_names: &[String],
    attributions: &Attributions,
    title: &str,
) -> Plot {
    let order = features_by_importance(feature_names, attributions);
    let (n_rows, _, n_outputs) = attributions.values.dim();
    let mut plot = Plot::new();

    if n_outputs == 1 {
        for &f in &order {
            let x: Vec<f64> = (0..n_rows).map(|i| attributions.values[[i, f, 0]]).collect();
            let y = vec![feature_names[f].clone(); n_rows];
            let trace = Scatter::new(x, y)
                .mode(Mode::Markers)
                .name(&feature_names[f])
                .show_legend(false);
            plot.add_trace(trace);
        }
        plot.set_layout(
            Layout::new()
                .title(title)
                .x_axis(Axis::new().title("SHAP value (impact on model output)"))
                .height(200 + 30 * feature_names.len()),
        );
    } else {
        let labels: Vec<String> = order.iter().map(|&f| feature_names[f].clone()).collect();
        for o in 0..n_outputs {
            let values: Vec<f64> = order
                .iter()
                .map(|&f| {
                    (0..n_rows)
                        .map(|i| attributions.values[[i, f, o]].abs())
                        .sum::<f64>()
                        / n_rows.max(1) as f64
                })
                .collect();
            let name = output_names
                .get(o)
                .cloned()
                .unwrap_or_else(|| format!("Class {}", o));
            let trace = Bar::new(values, labels.clone())
                .orientation(Orientation::Horizontal)
                .name(&name);
            plot.add_trace(trace);
        }
        plot.set_layout(
            Layout::new()
                .title(title)
                .bar_mode(BarMode::Stack)
                .x_axis(Axis::new().title("mean(|SHAP value|)"))
                .height(200 + 30 * feature_names.len()),
        );
    }

    plot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn summary_has_one_trace_per_output_for_classifiers() {
        let attributions = Attributions {
            base_values: vec![0.5, 0.5],
            values: Array3::from_elem((4, 3, 2), 0.1),
        };
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let outputs = vec!["high".to_string(), "low".to_string()];
        let plot = plot_shap_summary(&names, &outputs, &attributions, "summary");
        let html = plot.to_inline_html(Some("summary"));
        assert!(html.contains("high"));
        assert!(html.contains("low"));
    }
}
