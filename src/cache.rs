//! File-presence cache for encoded comment matrices.
//!
//! Encoded inputs live in the work directory as
//! `training_<ENCODER>-comments.npy` and `test_<ENCODER>-comments.npy`. When
//! both exist with the configured width they are loaded. When only one is
//! missing, it is encoded with the saved encoder. Otherwise the encoder is
//! refitted and both are rewritten.

use crate::config::{EncoderConfig, EncoderType};
use crate::data::{CommentDataset, Split};
use crate::encoders::{build_encoder, encoded_width, Encoder};
use crate::error::{Error, Result};
use crate::logging::timed;
use crate::npy;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Encoded inputs paired with class labels.
#[derive(Debug, Clone)]
pub struct LabeledMatrix {
    pub x: Array2<f32>,
    pub y: Vec<usize>,
}

impl LabeledMatrix {
    pub fn new(x: Array2<f32>, y: Vec<usize>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} encoded rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        Ok(LabeledMatrix { x, y })
    }
}

/// Cache file locations for one encoder.
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub train: PathBuf,
    pub test: PathBuf,
}

impl CachePaths {
    pub fn new(workdir: &Path, encoder: EncoderType) -> Self {
        CachePaths {
            train: workdir.join(format!("training_{}-comments.npy", encoder)),
            test: workdir.join(format!("test_{}-comments.npy", encoder)),
        }
    }

    pub fn path(&self, split: Split) -> &Path {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

/// Build the configured encoder and encode `texts` with it.
///
/// An encoder that needs fitting (LSI without a saved model) is fitted on
/// `texts` first.
pub fn encode_text(config: &EncoderConfig, workdir: &Path, texts: &[String]) -> Result<Array2<f32>> {
    let mut encoder = build_encoder(config, workdir, true)?;
    if !encoder.is_fitted() {
        encoder.fit(texts)?;
    }
    encode_with(encoder.as_ref(), texts)
}

fn encode_with(encoder: &dyn Encoder, texts: &[String]) -> Result<Array2<f32>> {
    timed("encode_text", || -> Result<Array2<f32>> {
        let encoded = encoder.encode(texts).inspect_err(|e| {
            error!("Error while encoding inputs: {}", e);
        })?;
        info!("Comments encoded: {:?}", encoded.dim());
        Ok(encoded)
    })
}

/// Load the cached train and test matrices.
pub fn load_encoded_inputs(paths: &CachePaths) -> Result<(Array2<f32>, Array2<f32>)> {
    info!("Loading encoded training matrix from: {}", paths.train.display());
    let train = npy::read_matrix(&paths.train)?;
    info!("Loading encoded test matrix from: {}", paths.test.display());
    let test = npy::read_matrix(&paths.test)?;
    Ok((train, test))
}

/// Encode the dataset, or load it from the cache when both matrices exist.
pub fn encode_or_load_data(
    config: &EncoderConfig,
    workdir: &Path,
    dataset: &CommentDataset,
) -> Result<(LabeledMatrix, LabeledMatrix)> {
    timed("encode_or_load_data", || -> Result<(LabeledMatrix, LabeledMatrix)> {
        std::fs::create_dir_all(workdir).map_err(|e| Error::io(workdir, e))?;
        let paths = CachePaths::new(workdir, config.encoder_type);

        let cached = if paths.train.exists() && paths.test.exists() {
            info!("Loading train & test inputs from file");
            let (train, test) = load_encoded_inputs(&paths)?;
            let width = encoded_width(config);
            if train.ncols() == width && test.ncols() == width {
                Some((train, test))
            } else {
                warn!(
                    "Cached inputs have widths {} and {}, expected {}; re-encoding",
                    train.ncols(),
                    test.ncols(),
                    width
                );
                None
            }
        } else {
            None
        };

        let (train_x, test_x) = match cached {
            Some(matrices) => matrices,
            None => {
                // A saved model is only reused to complete a half-written cache
                let restore = paths.train.exists() != paths.test.exists();
                let mut encoder = build_encoder(config, workdir, restore)?;
                let refit = !encoder.is_fitted();
                if refit {
                    info!("Fitting {} encoder on training comments", encoder.name());
                    encoder.fit(&dataset.texts(Split::Train))?;
                    encoder.save(workdir)?;
                }
                let reuse = !refit;
                let train =
                    encode_or_load_split(encoder.as_ref(), &paths, dataset, Split::Train, reuse)?;
                let test =
                    encode_or_load_split(encoder.as_ref(), &paths, dataset, Split::Test, reuse)?;
                (train, test)
            }
        };

        if train_x.ncols() != test_x.ncols() {
            return Err(Error::ShapeMismatch(format!(
                "train width {} differs from test width {}",
                train_x.ncols(),
                test_x.ncols()
            )));
        }

        let train = LabeledMatrix::new(train_x, dataset.labels(Split::Train)?)?;
        let test = LabeledMatrix::new(test_x, dataset.labels(Split::Test)?)?;
        Ok((train, test))
    })
}

fn encode_or_load_split(
    encoder: &dyn Encoder,
    paths: &CachePaths,
    dataset: &CommentDataset,
    split: Split,
    reuse: bool,
) -> Result<Array2<f32>> {
    let path = paths.path(split);
    if reuse && path.exists() {
        info!("Loading cached {:?} inputs from {}", split, path.display());
        let cached = npy::read_matrix(path)?;
        if cached.ncols() == encoder.dim() {
            return Ok(cached);
        }
        warn!(
            "Cached {:?} inputs are {} wide but {} produces {}; re-encoding",
            split,
            cached.ncols(),
            encoder.name(),
            encoder.dim()
        );
    }

    info!("Encoding {:?} inputs", split);
    let encoded = encode_with(encoder, &dataset.texts(split)).inspect_err(|_| {
        error!("Error while encoding {:?} dataset", split);
    })?;
    npy::write_matrix(path, &encoded)?;
    Ok(encoded)
}
