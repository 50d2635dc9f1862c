//! Integration tests for the severity label encoder and the scaler.

use impact_models::error::ImpactError;
use impact_models::preprocessing::{LabelEncoder, Scaler};
use ndarray::array;

// ---------------------------------------------------------------------------
// LabelEncoder
// ---------------------------------------------------------------------------

#[test]
fn encoder_is_a_sorted_bijection() {
    let labels = ["low", "high", "medium", "low", "high"];
    let encoder = LabelEncoder::fit(&labels);
    assert_eq!(encoder.classes(), &["high", "low", "medium"]);
    assert_eq!(encoder.n_classes(), 3);

    let codes = encoder.transform(&labels).unwrap();
    assert_eq!(codes, vec![1, 0, 2, 1, 0]);
    assert_eq!(encoder.inverse_transform(&codes).unwrap(), labels);
}

#[test]
fn unseen_label_and_code_are_errors() {
    let encoder = LabelEncoder::fit(&["high", "low"]);
    assert!(matches!(
        encoder.encode("catastrophic"),
        Err(ImpactError::UnknownLabel(l)) if l == "catastrophic"
    ));
    assert!(matches!(encoder.decode(2), Err(ImpactError::UnknownClassIndex(2))));
}

#[test]
fn encoder_survives_json() {
    let encoder = LabelEncoder::fit(&["medium", "high", "low"]);
    let json = serde_json::to_string(&encoder).unwrap();
    let restored: LabelEncoder = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, encoder);
    assert_eq!(restored.decode(2).unwrap(), "medium");
}

// ---------------------------------------------------------------------------
// Scaler
// ---------------------------------------------------------------------------

#[test]
fn scaler_centers_and_scales_columns() {
    let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
    let scaler = Scaler::fit(&x).unwrap();
    assert!((scaler.mean[0] - 2.5).abs() < 1e-12);
    assert!((scaler.mean[1] - 25.0).abs() < 1e-12);

    let t = scaler.transform(&x);
    for col in t.columns() {
        assert!(col.sum().abs() < 1e-9);
        let var = col.iter().map(|v| v * v).sum::<f64>() / col.len() as f64;
        assert!((var - 1.0).abs() < 1e-9);
    }
}

#[test]
fn constant_column_is_left_unscaled() {
    let x = array![[5.0], [5.0], [5.0]];
    let scaler = Scaler::fit(&x).unwrap();
    assert_eq!(scaler.std, vec![1.0]);
    assert!(scaler.transform(&x).iter().all(|v| *v == 0.0));
}

#[test]
fn empty_matrix_cannot_be_fit() {
    let x = ndarray::Array2::<f64>::zeros((0, 3));
    assert!(Scaler::fit(&x).is_err());
}
