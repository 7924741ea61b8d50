//! Comment dataset records and CSV loading.

use crate::error::{Error, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Class names in label-index order.
pub const TARGET_NAMES: [&str; 2] = ["kept", "removed"];

/// A single dataset row: the comment text and whether moderators removed it.
#[derive(Debug, Deserialize, Clone)]
pub struct CommentRecord {
    /// Comment body text
    #[serde(rename = "BODY")]
    pub body: String,
    /// Raw removal flag as found in the CSV
    #[serde(rename = "REMOVED")]
    pub removed: String,
}

impl CommentRecord {
    /// Parse the raw `REMOVED` cell into a class index.
    pub fn label(&self, row: usize) -> Result<usize> {
        parse_label(&self.removed).ok_or_else(|| Error::InvalidLabel {
            row,
            value: self.removed.clone(),
        })
    }
}

fn parse_label(raw: &str) -> Option<usize> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(1),
        "0" | "0.0" | "false" | "no" => Some(0),
        _ => None,
    }
}

/// Load comment records from a headered CSV file.
pub fn load_comments(path: impl AsRef<Path>) -> Result<Vec<CommentRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let records: Vec<CommentRecord> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::csv(path, e))?;

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Which half of the dataset to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Train and test comment sets loaded from separate CSV files.
#[derive(Debug, Clone)]
pub struct CommentDataset {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    train: Vec<CommentRecord>,
    test: Vec<CommentRecord>,
}

impl CommentDataset {
    pub fn load(train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<Self> {
        let train = load_comments(&train_path)?;
        let test = load_comments(&test_path)?;
        info!("Train: {} | Test: {}", train.len(), test.len());

        Ok(CommentDataset {
            train_path: train_path.as_ref().to_path_buf(),
            test_path: test_path.as_ref().to_path_buf(),
            train,
            test,
        })
    }

    pub fn records(&self, split: Split) -> &[CommentRecord] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }

    /// The `BODY` column of a split.
    pub fn texts(&self, split: Split) -> Vec<String> {
        self.records(split).iter().map(|r| r.body.clone()).collect()
    }

    /// The `REMOVED` column of a split as class indices.
    pub fn labels(&self, split: Split) -> Result<Vec<usize>> {
        self.records(split)
            .iter()
            .enumerate()
            .map(|(row, r)| r.label(row))
            .collect()
    }
}
