//! Model artifact persistence
//!
//! The active model, its scaler and feature names are written as one bincode
//! document tagged with an artifact id and save time.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::inference::{ActiveModel, ModelManager};
use super::RegressionMetrics;
use crate::error::{Result, SalesMlError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub artifact_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub active: ActiveModel,
}

impl ModelArtifact {
    pub fn new(active: ActiveModel) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            saved_at: Utc::now(),
            active,
        }
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl ModelManager {
    /// Write the active model to `path`, returning the new artifact id
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<Uuid> {
        let active = self.active().ok_or(SalesMlError::NoActiveModel)?;
        let artifact = ModelArtifact::new(active.clone());
        artifact.write_to(&path)?;
        info!(
            path = %path.as_ref().display(),
            artifact_id = %artifact.artifact_id,
            model = %active.name(),
            "model saved"
        );
        Ok(artifact.artifact_id)
    }

    /// Install the model stored at `path` as the active model
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<RegressionMetrics> {
        let artifact = ModelArtifact::read_from(&path)?;
        let metrics = artifact.active.metrics();
        info!(
            path = %path.as_ref().display(),
            artifact_id = %artifact.artifact_id,
            saved_at = %artifact.saved_at,
            model = %artifact.active.name(),
            "model loaded"
        );
        self.install(artifact.active);
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ml::tuning::TUNED_FOREST_NAME;
    use crate::ml::{Capabilities, FeatureMatrix, ModelFamily};
    use tempfile::tempdir;

    fn trained() -> (ModelManager, FeatureMatrix) {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 8) as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| r[0] * r[1] + 2.0).collect();
        let x = FeatureMatrix::new(rows, vec!["a".into(), "b".into()]).unwrap();
        let mut config = Config::default();
        config.training.n_estimators = 10;
        let mut manager = ModelManager::new(&config).with_capabilities(Capabilities::probe());
        manager.train(&x, &y).unwrap();
        (manager, x)
    }

    #[test]
    fn test_save_without_model() {
        let dir = tempdir().unwrap();
        let err = ModelManager::default().save(dir.path().join("m.bin")).unwrap_err();
        assert!(matches!(err, SalesMlError::NoActiveModel));
    }

    #[test]
    fn test_round_trip_reproduces_predictions() {
        let (manager, x) = trained();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("best_model.bin");
        manager.save(&path).unwrap();

        let mut restored = ModelManager::default();
        let metrics = restored.load(&path).unwrap();
        assert_eq!(metrics, manager.active().unwrap().metrics());
        assert_eq!(restored.active().unwrap().name(), manager.active().unwrap().name());
        assert_eq!(
            restored.predict(x.rows()).unwrap(),
            manager.predict(x.rows()).unwrap()
        );
    }

    #[test]
    fn test_tuned_forest_round_trip() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i % 9) as f64, ((i * 3) % 7) as f64])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 4.0 * r[0] - r[1] * r[1]).collect();
        let x = FeatureMatrix::new(rows, vec!["a".into(), "b".into()]).unwrap();
        let mut config = Config::default();
        config.tuning.tree_counts = vec![5, 10];
        config.tuning.max_depths = vec![0, 4];
        let mut manager = ModelManager::new(&config);
        let tuned = manager.tune(&x, &y, "Random Forest").unwrap().unwrap();
        assert_eq!(tuned.family(), ModelFamily::RandomForest);

        let dir = tempdir().unwrap();
        let path = dir.path().join("tuned_forest.bin");
        manager.save(&path).unwrap();

        let mut restored = ModelManager::default();
        restored.load(&path).unwrap();
        assert_eq!(restored.active().unwrap().name(), TUNED_FOREST_NAME);
        assert_eq!(
            restored.predict(x.rows()).unwrap(),
            manager.predict(x.rows()).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let mut manager = ModelManager::default();
        assert!(matches!(
            manager.load(dir.path().join("absent.bin")),
            Err(SalesMlError::Io(_))
        ));
        assert!(manager.active().is_none());
    }
}
