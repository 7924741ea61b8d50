//! Text encoders turning comments into fixed-width vectors.
//!
//! Two encoders are available, selected by name:
//!
//! - [`sentence`] - pretrained multilingual sentence embeddings (`LASER`),
//!   compiled in with the `bert` feature
//! - [`lsi`] - TF-IDF weighting followed by a latent semantic indexing
//!   projection (`LSI`), fitted on the training comments
//!
//! Both produce an `ndarray` matrix with one row per input text.

pub mod lsi;
pub mod sentence;
pub mod tfidf;

use crate::config::{EncoderConfig, EncoderType};
use crate::error::Result;
use ndarray::Array2;
use std::path::Path;
use tracing::{info, warn};

pub use lsi::LsiEncoder;
pub use sentence::SentenceEncoder;
pub use tfidf::TfidfVectorizer;

/// Converts raw text into dense rows of a fixed width.
pub trait Encoder {
    /// Name used in cache file names, e.g. `LSI`.
    fn name(&self) -> &'static str;

    /// Width of every encoded row.
    fn dim(&self) -> usize;

    /// Whether [`Encoder::encode`] can be called without fitting first.
    fn is_fitted(&self) -> bool {
        true
    }

    /// Learn encoder state from training texts. Pretrained encoders ignore this.
    fn fit(&mut self, _texts: &[String]) -> Result<()> {
        Ok(())
    }

    /// Encode texts into a `texts.len() x dim()` matrix.
    fn encode(&self, texts: &[String]) -> Result<Array2<f32>>;

    /// Persist fitted state into `dir` so later runs encode consistently.
    fn save(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Build the encoder named by `config`.
///
/// With `restore`, a fitted LSI model saved in `workdir` is reused when it was
/// built with the configured `keep_n` and `num_topics`; otherwise a fresh,
/// unfitted encoder is returned.
pub fn build_encoder(
    config: &EncoderConfig,
    workdir: &Path,
    restore: bool,
) -> Result<Box<dyn Encoder>> {
    match config.encoder_type {
        EncoderType::Laser => {
            let batch_size = if config.parallel { config.batch_size } else { 1 };
            Ok(Box::new(SentenceEncoder::new(batch_size)?))
        }
        EncoderType::Lsi => {
            let model_path = LsiEncoder::model_path(workdir);
            if restore && model_path.exists() {
                let saved = LsiEncoder::load(&model_path)?;
                if saved.has_shape(config.keep_n, config.num_topics) {
                    info!("Restoring LSI model from {}", model_path.display());
                    return Ok(Box::new(saved));
                }
                warn!(
                    "Saved LSI model {} does not match keep_n={} num_topics={}; refitting",
                    model_path.display(),
                    config.keep_n,
                    config.num_topics
                );
            }
            Ok(Box::new(LsiEncoder::new(config.keep_n, config.num_topics)))
        }
    }
}

/// Row width the configured encoder produces.
pub fn encoded_width(config: &EncoderConfig) -> usize {
    match config.encoder_type {
        EncoderType::Laser => sentence::SENTENCE_DIM,
        EncoderType::Lsi => config.num_topics,
    }
}
