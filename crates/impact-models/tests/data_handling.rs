//! Integration tests for table loading and row bookkeeping.

mod common;

use impact_models::config::PipelinePaths;
use impact_models::data_handling::{sample_rows, FeatureTable, RegressionTarget};
use impact_models::error::ImpactError;
use impact_models::io::{load_dataset, read_feature_csv, read_target_csv, TableReaderConfig};

fn paths_for(root: &std::path::Path) -> PipelinePaths {
    PipelinePaths::resolve(root, None, None, None)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn load_dataset_drops_identifier_columns() {
    let root = tempfile::tempdir().unwrap();
    let paths = paths_for(root.path());
    common::write_dataset(&paths.data_dir, 12);

    let dataset = load_dataset(&paths).unwrap();
    assert_eq!(dataset.features.names, common::FEATURE_NAMES);
    assert_eq!(dataset.features.nrows(), 12);
    assert_eq!(dataset.targets.nrows(), 12);

    let f = common::event(3);
    assert_eq!(dataset.features.x.row(3).to_vec(), f.to_vec());
    assert_eq!(dataset.targets.impact_rank[3], common::impact_rank(&f));
    assert_eq!(
        dataset.targets.column(RegressionTarget::TotalFatalities)[3],
        common::outcomes(&f)[1]
    );
}

#[test]
fn missing_features_file_names_the_path() {
    let root = tempfile::tempdir().unwrap();
    let paths = paths_for(root.path());
    common::write_dataset(&paths.data_dir, 5);
    std::fs::remove_file(paths.features_path()).unwrap();

    match load_dataset(&paths) {
        Err(ImpactError::DataNotFound { path }) => assert_eq!(path, paths.features_path()),
        other => panic!("expected DataNotFound, got {:?}", other.map(|_| ())),
    }
    let message = load_dataset(&paths).unwrap_err().to_string();
    assert!(message.contains("features.csv"), "{}", message);
}

#[test]
fn missing_targets_file_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let paths = paths_for(root.path());
    common::write_dataset(&paths.data_dir, 5);
    std::fs::remove_file(paths.targets_path()).unwrap();

    assert!(matches!(
        load_dataset(&paths),
        Err(ImpactError::DataNotFound { .. })
    ));
}

#[test]
fn row_count_mismatch_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let paths = paths_for(root.path());
    common::write_dataset(&paths.data_dir, 6);
    let short = root.path().join("short");
    common::write_dataset(&short, 4);
    std::fs::copy(short.join("targets.csv"), paths.targets_path()).unwrap();

    assert!(matches!(
        load_dataset(&paths),
        Err(ImpactError::RowCountMismatch {
            features: 6,
            targets: 4
        })
    ));
}

#[test]
fn non_numeric_feature_cell_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.csv");
    std::fs::write(&path, "event_id,magnitude,region\n1,0.5,north\n").unwrap();

    match read_feature_csv(&path, &TableReaderConfig::default()) {
        Err(ImpactError::Parse { column, value, row, .. }) => {
            assert_eq!(column, "region");
            assert_eq!(value, "north");
            assert_eq!(row, 1);
        }
        other => panic!("expected Parse error, got {:?}", other),
    }
}

#[test]
fn identifier_columns_are_optional() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.csv");
    std::fs::write(&path, "magnitude,is_urban\n0.5,1\n0.7,0\n").unwrap();

    let table = read_feature_csv(&path, &TableReaderConfig::default()).unwrap();
    assert_eq!(table.names, vec!["magnitude", "is_urban"]);
    assert_eq!(table.nrows(), 2);
}

#[test]
fn target_table_requires_every_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("targets.csv");
    std::fs::write(
        &path,
        "impact_rank,total_population_affected,total_fatalities,total_injuries\nhigh,1,2,3\n",
    )
    .unwrap();

    match read_target_csv(&path) {
        Err(ImpactError::MissingColumn { column, .. }) => {
            assert_eq!(column, "total_socio_economic_loss")
        }
        other => panic!("expected MissingColumn, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Column alignment and sampling
// ---------------------------------------------------------------------------

#[test]
fn align_reorders_and_ignores_extra_columns() {
    let table = FeatureTable::from_row(&[("extra", 9.0), ("b", 2.0), ("a", 1.0)]);
    let order = vec!["a".to_string(), "b".to_string()];
    let x = table.align_to(&order).unwrap();
    assert_eq!(x.row(0).to_vec(), vec![1.0, 2.0]);
}

#[test]
fn align_lists_every_missing_column() {
    let table = FeatureTable::from_row(&[("a", 1.0)]);
    let order = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    match table.align_to(&order) {
        Err(ImpactError::FeatureMismatch { missing }) => assert_eq!(missing, vec!["b", "c"]),
        other => panic!("expected FeatureMismatch, got {:?}", other),
    }
}

#[test]
fn sample_rows_is_bounded_and_distinct() {
    let rows = sample_rows(50, 10, 42);
    assert_eq!(rows.len(), 10);
    let mut sorted = rows.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 10);
    assert!(rows.iter().all(|&r| r < 50));

    assert_eq!(sample_rows(4, 1000, 42).len(), 4);
    assert_eq!(sample_rows(50, 10, 42), rows);
}
