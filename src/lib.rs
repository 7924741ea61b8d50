//! # comment-removal - Predicting Moderated Comments
//!
//! An experiment harness that turns comments into fixed-width vectors and
//! fits off-the-shelf classifiers to predict whether moderators removed them.
//!
//! ## Features
//!
//! - **Two encoders**: multilingual sentence embeddings (`bert` feature) or a
//!   TF-IDF + LSI topic model
//! - **Encoding cache**: encoded matrices are stored as `.npy` files in the
//!   work directory and reused on the next run
//! - **Three classifiers**: random forest, RBF support vector classifier and
//!   a small multilayer perceptron, chosen by name
//! - **Evaluation**: accuracy, classification report, ROC AUC, an SVG ROC plot
//!   and a TSV of test predictions
//!
//! ## Quick Start
//!
//! ```bash
//! # LSI encodings + random forest, paths from config.toml
//! cargo run --release -- train --encoder LSI --classifier randomforest
//!
//! # Sentence embeddings (requires libtorch)
//! cargo run --release --features bert -- train --encoder LASER --classifier mlp
//! ```
//!
//! ### Library Usage
//!
//! ```no_run
//! use comment_removal::config::Config;
//! use comment_removal::pipeline::run_train;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     let report = run_train(&config)?;
//!
//!     println!("Test accuracy: {:.2}%", report.score * 100.0);
//!     println!("ROC AUC: {:.3}", report.roc_auc);
//!     Ok(())
//! }
//! ```
//!
//! ## Data
//!
//! Train and test sets are headered CSV files with a `BODY` text column and
//! a `REMOVED` flag (`1`/`0`, `true`/`false` or `yes`/`no`). Label `0` is
//! "kept" and `1` is "removed".
//!
//! ## Work Directory
//!
//! | File | Contents |
//! |------|----------|
//! | `training_<ENC>-comments.npy` | Encoded training matrix |
//! | `test_<ENC>-comments.npy` | Encoded test matrix |
//! | `lsi_model.json` | Fitted LSI encoder |
//! | `<clf_save_name>_<clf>.json` | Fitted classifier |
//! | `roc_curve.svg` | ROC curves of the last evaluation |
//!
//! ## License
//!
//! GNU General Public License v3.0 (GPLv3)

pub mod cache;
pub mod classifiers;
pub mod cli;
pub mod config;
pub mod data;
pub mod encoders;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod npy;
pub mod pipeline;
pub mod plotting;
pub mod predictions;

pub use classifiers::{Classifier, Model};
pub use config::{ClassifierType, Config, EncoderType};
pub use data::{CommentDataset, TARGET_NAMES};
pub use error::{Error, Result};
pub use pipeline::EvaluationReport;
