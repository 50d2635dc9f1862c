//! JSON-backed model store.
//!
//! Every artifact kind knows its own file name. Callers address artifacts by
//! kind and key, e.g. `RegressorArtifact` with `RegressionTarget::TotalFatalities`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data_handling::RegressionTarget;
use crate::error::{ImpactError, Result};
use crate::models::{ClassifierModel, RegressorModel};
use crate::preprocessing::LabelEncoder;

/// An artifact that can be written to and read from the store.
pub trait NamedArtifact: Serialize + DeserializeOwned {
    type Key: Copy + std::fmt::Debug;

    fn key(&self) -> Self::Key;

    fn file_name(key: Self::Key) -> String;
}

/// The winning severity classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierArtifact {
    pub variant: String,
    pub f1_macro: f64,
    /// Column order the model was fitted on.
    pub feature_names: Vec<String>,
    pub model: ClassifierModel,
}

/// The winning regressor for one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressorArtifact {
    pub target: RegressionTarget,
    pub variant: String,
    pub rmse: f64,
    pub feature_names: Vec<String>,
    pub model: RegressorModel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderArtifact {
    pub encoder: LabelEncoder,
}

impl NamedArtifact for ClassifierArtifact {
    type Key = ();

    fn key(&self) {}

    fn file_name(_: ()) -> String {
        "best_classification_model.json".to_string()
    }
}

impl NamedArtifact for EncoderArtifact {
    type Key = ();

    fn key(&self) {}

    fn file_name(_: ()) -> String {
        "label_encoder.json".to_string()
    }
}

impl NamedArtifact for RegressorArtifact {
    type Key = RegressionTarget;

    fn key(&self) -> RegressionTarget {
        self.target
    }

    fn file_name(target: RegressionTarget) -> String {
        format!("best_regression_model_{}.json", target.column())
    }
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for<A: NamedArtifact>(&self, key: A::Key) -> PathBuf {
        self.dir.join(A::file_name(key))
    }

    /// Write `artifact`, replacing any previous file under the same key.
    pub fn save<A: NamedArtifact>(&self, artifact: &A) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ImpactError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for::<A>(artifact.key());
        let file = File::create(&path).map_err(|source| ImpactError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, artifact)?;
        writer.flush().map_err(|source| ImpactError::Io {
            path: path.clone(),
            source,
        })?;
        log::info!("Saved {}", path.display());
        Ok(path)
    }

    /// Read the artifact stored under `key`.
    pub fn try_load<A: NamedArtifact>(&self, key: A::Key) -> Result<A> {
        let path = self.path_for::<A>(key);
        let file = File::open(&path).map_err(|source| ImpactError::Io {
            path: path.clone(),
            source,
        })?;
        let artifact = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("Loaded {}", path.display());
        Ok(artifact)
    }

    /// Like [`ModelStore::try_load`], but logs and returns `None` on failure.
    pub fn load<A: NamedArtifact>(&self, key: A::Key) -> Option<A> {
        match self.try_load(key) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                log::error!("Error loading model '{}': {}", A::file_name(key), e);
                None
            }
        }
    }
}

/// Write a metrics report as indented JSON to `<metrics_dir>/<name>`.
pub fn save_metrics<T: Serialize>(metrics_dir: &Path, name: &str, report: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(metrics_dir).map_err(|source| ImpactError::Io {
        path: metrics_dir.to_path_buf(),
        source,
    })?;
    let path = metrics_dir.join(name);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).map_err(|source| ImpactError::Io {
        path: path.clone(),
        source,
    })?;
    log::info!("Metrics saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_artifact_kind() {
        let store = ModelStore::new("/models");
        assert_eq!(
            store.path_for::<ClassifierArtifact>(()),
            PathBuf::from("/models/best_classification_model.json")
        );
        assert_eq!(
            store.path_for::<RegressorArtifact>(RegressionTarget::TotalSocioEconomicLoss),
            PathBuf::from("/models/best_regression_model_total_socio_economic_loss.json")
        );
    }

    #[test]
    fn missing_artifact_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(store.load::<EncoderArtifact>(()).is_none());
    }

    #[test]
    fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .save(&EncoderArtifact {
                encoder: LabelEncoder::fit(&["a"]),
            })
            .unwrap();
        store
            .save(&EncoderArtifact {
                encoder: LabelEncoder::fit(&["b", "c"]),
            })
            .unwrap();
        let loaded = store.load::<EncoderArtifact>(()).unwrap();
        assert_eq!(loaded.encoder.classes(), &["b", "c"]);
    }
}
