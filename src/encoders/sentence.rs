//! Multilingual sentence embeddings via rust-bert (libtorch backend).
//!
//! Stands in for LASER: a pretrained language-agnostic sentence encoder that
//! needs no fitting. Only available when compiled with `--features bert`.

use super::Encoder;
use crate::error::{Error, Result};
use ndarray::Array2;

#[cfg(feature = "bert")]
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
};

/// Output width of distiluse-base-multilingual-cased.
pub const SENTENCE_DIM: usize = 512;

#[cfg(feature = "bert")]
pub struct SentenceEncoder {
    model: SentenceEmbeddingsModel,
    batch_size: usize,
}

#[cfg(feature = "bert")]
impl SentenceEncoder {
    pub fn new(batch_size: usize) -> Result<Self> {
        let device = tch::Device::cuda_if_available();
        tracing::info!("Loading multilingual sentence encoder on {:?}", device);

        let model = SentenceEmbeddingsBuilder::remote(
            SentenceEmbeddingsModelType::DistiluseBaseMultilingualCased,
        )
        .with_device(device)
        .create_model()
        .map_err(|e| Error::EncoderUnavailable {
            name: "LASER".to_string(),
            reason: e.to_string(),
        })?;

        Ok(SentenceEncoder {
            model,
            batch_size: batch_size.max(1),
        })
    }
}

#[cfg(feature = "bert")]
impl Encoder for SentenceEncoder {
    fn name(&self) -> &'static str {
        "LASER"
    }

    fn dim(&self) -> usize {
        SENTENCE_DIM
    }

    fn encode(&self, texts: &[String]) -> Result<Array2<f32>> {
        let mut data = Vec::with_capacity(texts.len() * SENTENCE_DIM);
        for (i, chunk) in texts.chunks(self.batch_size).enumerate() {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let embeddings = self
                .model
                .encode(&refs)
                .map_err(|e| Error::Encoding(e.to_string()))?;
            for embedding in embeddings {
                if embedding.len() != SENTENCE_DIM {
                    return Err(Error::ShapeMismatch(format!(
                        "sentence embedding has width {}, expected {}",
                        embedding.len(),
                        SENTENCE_DIM
                    )));
                }
                data.extend(embedding);
            }
            if (i + 1) % 50 == 0 {
                tracing::debug!("Encoded {}/{}", (i + 1) * self.batch_size, texts.len());
            }
        }

        Array2::from_shape_vec((texts.len(), SENTENCE_DIM), data)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))
    }
}

// Fallback
#[cfg(not(feature = "bert"))]
pub struct SentenceEncoder;

#[cfg(not(feature = "bert"))]
impl SentenceEncoder {
    pub fn new(_batch_size: usize) -> Result<Self> {
        Err(Error::EncoderUnavailable {
            name: "LASER".to_string(),
            reason: "compile with `--features bert` to enable sentence embeddings".to_string(),
        })
    }
}

#[cfg(not(feature = "bert"))]
impl Encoder for SentenceEncoder {
    fn name(&self) -> &'static str {
        "LASER"
    }

    fn dim(&self) -> usize {
        SENTENCE_DIM
    }

    fn encode(&self, _texts: &[String]) -> Result<Array2<f32>> {
        Err(Error::EncoderUnavailable {
            name: "LASER".to_string(),
            reason: "built without the `bert` feature".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "bert"))]
    #[test]
    fn test_unavailable_without_feature() {
        assert!(matches!(
            SentenceEncoder::new(8),
            Err(Error::EncoderUnavailable { .. })
        ));
    }

    #[cfg(feature = "bert")]
    #[test]
    #[ignore = "downloads a pretrained model"]
    fn test_sentence_embeddings() {
        let encoder = SentenceEncoder::new(2).unwrap();
        let texts = vec!["This is a test.".to_string(), "Ceci est un test.".to_string()];
        let encoded = encoder.encode(&texts).unwrap();
        assert_eq!(encoded.dim(), (2, SENTENCE_DIM));
    }
}
