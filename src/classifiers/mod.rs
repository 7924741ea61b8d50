//! Off-the-shelf classifiers selected by name.
//!
//! Every model implements [`Classifier`]. [`build_classifier`] maps a
//! [`ClassifierType`] to a configured, unfitted [`Model`], and fitted models
//! are persisted as JSON with [`save_model`] / [`load_model`].

pub mod forest;
pub mod mlp;
pub mod svc;

use crate::config::{ClassifierConfig, ClassifierType};
use crate::error::{Error, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub use forest::{RandomForest, RandomForestParams};
pub use mlp::{Mlp, MlpParams};
pub use svc::{Svc, SvcParams};

/// A supervised model over dense `f32` feature rows and class-index labels.
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize]) -> Result<()>;

    /// Class probabilities, one row per sample, one column per class.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>>;

    fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    /// Mean accuracy on `x` against `y`.
    fn score(&self, x: &Array2<f32>, y: &[usize]) -> Result<f64> {
        let predictions = self.predict(x)?;
        Ok(crate::metrics::accuracy(y, &predictions))
    }
}

/// Index of the largest entry in each row; ties go to the lower class.
pub fn argmax_rows(proba: &Array2<f32>) -> Vec<usize> {
    proba
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, &p)| {
                    if p > best.1 {
                        (idx, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Validate a training set and return the number of classes.
pub(crate) fn check_training_set(x: &Array2<f32>, y: &[usize]) -> Result<usize> {
    if x.nrows() == 0 {
        return Err(Error::Empty("training matrix has no rows".into()));
    }
    if x.nrows() != y.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} training rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("features contain NaN or infinity".into()));
    }
    let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
    Ok(n_classes.max(2))
}

pub(crate) fn check_width(expected: usize, x: &Array2<f32>) -> Result<()> {
    if x.ncols() != expected {
        return Err(Error::ShapeMismatch(format!(
            "model expects {} features, got {}",
            expected,
            x.ncols()
        )));
    }
    Ok(())
}

/// The closed set of supported classifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Model {
    RandomForest(RandomForest),
    Svc(Svc),
    Mlp(Mlp),
}

impl Model {
    pub fn kind(&self) -> ClassifierType {
        match self {
            Model::RandomForest(_) => ClassifierType::RandomForest,
            Model::Svc(_) => ClassifierType::Svc,
            Model::Mlp(_) => ClassifierType::Mlp,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Model::RandomForest(m) => m,
            Model::Svc(m) => m,
            Model::Mlp(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Model::RandomForest(m) => m,
            Model::Svc(m) => m,
            Model::Mlp(m) => m,
        }
    }
}

impl Classifier for Model {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        self.inner().predict_proba(x)
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        self.inner().predict(x)
    }
}

/// Build an unfitted classifier of the configured type.
pub fn build_classifier(config: &ClassifierConfig) -> Model {
    let seed = config.random_seed;
    match config.clf_type {
        ClassifierType::RandomForest => Model::RandomForest(RandomForest::new(RandomForestParams {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            max_features: config.max_features,
            n_jobs: config.n_jobs,
            seed,
        })),
        ClassifierType::Svc => Model::Svc(Svc::new(SvcParams {
            c: config.svc_c,
            gamma: None,
            tol: 1e-3,
            max_iter: config.svc_max_iter,
            cache_mb: 200,
        })),
        ClassifierType::Mlp => Model::Mlp(Mlp::new(MlpParams {
            hidden_layers: config.hidden_layers.clone(),
            learning_rate: config.learning_rate,
            max_epochs: config.max_epochs,
            batch_size: config.batch_size,
            early_stopping: config.early_stopping,
            seed,
            ..MlpParams::default()
        })),
    }
}

/// Save a fitted model as JSON.
pub fn save_model(model: &Model, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let json = serde_json::to_string(model)?;
    std::fs::write(path, json).map_err(|e| Error::io(path, e))?;
    info!("Saved {} model to {}", model.kind(), path.display());
    Ok(())
}

/// Load a model saved by [`save_model`].
pub fn load_model(path: &Path) -> Result<Model> {
    let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let model: Model = serde_json::from_str(&json)?;
    info!("Loaded {} model from {}", model.kind(), path.display());
    Ok(model)
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_rows() {
        let proba = array![[0.2f32, 0.8], [0.6, 0.4], [0.5, 0.5]];
        assert_eq!(argmax_rows(&proba), vec![1, 0, 0]);
    }

    #[test]
    fn test_check_training_set() {
        let x = Array2::<f32>::zeros((3, 2));
        assert_eq!(check_training_set(&x, &[0, 1, 1]).unwrap(), 2);
        assert!(matches!(
            check_training_set(&x, &[0, 1]),
            Err(Error::ShapeMismatch(_))
        ));

        let mut bad = x.clone();
        bad[[0, 0]] = f32::NAN;
        assert!(matches!(
            check_training_set(&bad, &[0, 1, 1]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_factory_dispatch() {
        for kind in [ClassifierType::RandomForest, ClassifierType::Svc, ClassifierType::Mlp] {
            let config = ClassifierConfig {
                clf_type: kind,
                ..ClassifierConfig::default()
            };
            assert_eq!(build_classifier(&config).kind(), kind);
        }
    }

    #[test]
    fn test_save_and_load_model() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = testing::blobs(20, 3, 5);
        let config = ClassifierConfig {
            clf_type: ClassifierType::RandomForest,
            n_estimators: 5,
            n_jobs: 2,
            ..ClassifierConfig::default()
        };
        let mut model = build_classifier(&config);
        model.fit(&x, &y).unwrap();

        let path = dir.path().join("models/clf_randomforest.json");
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.kind(), ClassifierType::RandomForest);
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
