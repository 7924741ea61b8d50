//! Error types shared by every stage of the experiment.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, encoding, training or reporting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid .npy file {path}: {reason}")]
    Npy { path: PathBuf, reason: String },

    #[error("invalid label {value:?} at row {row}; expected one of 1/0, true/false, yes/no")]
    InvalidLabel { row: usize, value: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unknown encoder {0:?}; valid encoders are LASER and LSI")]
    UnknownEncoder(String),

    #[error("unknown classifier {0:?}; valid classifiers are randomforest, svc and mlp")]
    UnknownClassifier(String),

    #[error("encoder {name} is unavailable: {reason}")]
    EncoderUnavailable { name: String, reason: String },

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("empty input: {0}")]
    Empty(String),

    #[error("invalid training input: {0}")]
    InvalidInput(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    #[error("plotting failed: {0}")]
    Plot(String),
}

impl Error {
    /// Wrap an I/O error together with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
