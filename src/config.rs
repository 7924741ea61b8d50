//! Configuration structures for the comment removal experiment.
//!
//! Settings are read from a TOML file (`config.toml` by default) with the
//! sections `[data]`, `[encoder]`, `[classifier]` and `[output]`. Every field
//! has a default, so a partial file or no file at all is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which text encoder produces the feature matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EncoderType {
    /// Pretrained multilingual sentence embeddings
    Laser,
    /// TF-IDF + latent semantic indexing topic projection
    Lsi,
}

impl EncoderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderType::Laser => "LASER",
            EncoderType::Lsi => "LSI",
        }
    }
}

impl FromStr for EncoderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LASER" | "SENTENCE" => Ok(EncoderType::Laser),
            "LSI" => Ok(EncoderType::Lsi),
            _ => Err(Error::UnknownEncoder(s.to_string())),
        }
    }
}

impl TryFrom<String> for EncoderType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EncoderType> for String {
    fn from(value: EncoderType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EncoderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which off-the-shelf classifier is trained on the encoded matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClassifierType {
    RandomForest,
    Svc,
    Mlp,
}

impl ClassifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierType::RandomForest => "randomforest",
            ClassifierType::Svc => "svc",
            ClassifierType::Mlp => "mlp",
        }
    }
}

impl FromStr for ClassifierType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "randomforest" | "random_forest" | "rf" => Ok(ClassifierType::RandomForest),
            "svc" | "svm" => Ok(ClassifierType::Svc),
            "mlp" => Ok(ClassifierType::Mlp),
            _ => Err(Error::UnknownClassifier(s.to_string())),
        }
    }
}

impl TryFrom<String> for ClassifierType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClassifierType> for String {
    fn from(value: ClassifierType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ClassifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration structure loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub encoder: EncoderConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

/// Dataset locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV with the training comments
    pub train_file: PathBuf,
    /// CSV with the test comments
    pub test_file: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            train_file: PathBuf::from("data/reddit_train.csv"),
            test_file: PathBuf::from("data/reddit_test.csv"),
        }
    }
}

/// Text encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// `LASER` or `LSI`
    pub encoder_type: EncoderType,
    /// Encode in batches instead of one text at a time
    pub parallel: bool,
    /// Texts per batch for the sentence encoder
    pub batch_size: usize,
    /// Dictionary size kept by the LSI encoder
    pub keep_n: usize,
    /// Latent topics produced by the LSI encoder
    pub num_topics: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            encoder_type: EncoderType::Laser,
            parallel: false,
            batch_size: 64,
            keep_n: 10_000,
            num_topics: 200,
        }
    }
}

/// Classifier selection and hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// `randomforest`, `svc` or `mlp`
    pub clf_type: ClassifierType,
    pub random_seed: u64,

    pub n_estimators: usize,
    pub max_depth: usize,
    pub max_features: usize,
    pub n_jobs: usize,

    pub svc_c: f64,
    pub svc_max_iter: usize,

    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    pub early_stopping: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            clf_type: ClassifierType::RandomForest,
            random_seed: 42,
            n_estimators: 1000,
            max_depth: 100,
            max_features: 100,
            n_jobs: 8,
            svc_c: 1.0,
            svc_max_iter: 100_000,
            hidden_layers: vec![512, 128],
            learning_rate: 0.001,
            max_epochs: 200,
            batch_size: 200,
            early_stopping: true,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for cached matrices, models and plots
    pub workdir: PathBuf,
    /// Base name of the saved classifier file
    pub clf_save_name: String,
    /// TSV file receiving test set predictions
    pub predictions_file: PathBuf,
    /// File name of the ROC plot inside `workdir`
    pub roc_plot_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            workdir: PathBuf::from("workdir"),
            clf_save_name: "comment_clf".to_string(),
            predictions_file: PathBuf::from("workdir/predictions.tsv"),
            roc_plot_file: "roc_curve.svg".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Path of the saved classifier, e.g. `workdir/comment_clf_svc.json`.
    pub fn model_path(&self) -> PathBuf {
        self.output.workdir.join(format!(
            "{}_{}.json",
            self.output.clf_save_name, self.classifier.clf_type
        ))
    }

    pub fn roc_plot_path(&self) -> PathBuf {
        self.output.workdir.join(&self.output.roc_plot_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [encoder]
            encoder_type = "LSI"

            [classifier]
            clf_type = "svc"
            random_seed = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.encoder.encoder_type, EncoderType::Lsi);
        assert_eq!(config.encoder.keep_n, 10_000);
        assert_eq!(config.classifier.clf_type, ClassifierType::Svc);
        assert_eq!(config.classifier.random_seed, 7);
        assert_eq!(config.classifier.hidden_layers, vec![512, 128]);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        assert!(matches!(
            "word2vec".parse::<EncoderType>(),
            Err(Error::UnknownEncoder(_))
        ));
        assert!(matches!(
            "xgboost".parse::<ClassifierType>(),
            Err(Error::UnknownClassifier(_))
        ));
        assert!(toml::from_str::<Config>("[classifier]\nclf_type = \"knn\"\n").is_err());
    }

    #[test]
    fn test_model_path() {
        let mut config = Config::default();
        config.classifier.clf_type = ClassifierType::Mlp;
        assert_eq!(
            config.model_path(),
            PathBuf::from("workdir/comment_clf_mlp.json")
        );
    }
}
