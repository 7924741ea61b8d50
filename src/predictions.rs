//! Test-split predictions written alongside the test comments.

use crate::data::load_comments;
use crate::error::{Error, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    #[serde(rename = "ID")]
    id: usize,
    #[serde(rename = "BODY")]
    body: &'a str,
    #[serde(rename = "REMOVED")]
    removed: &'a str,
    #[serde(rename = "Prediction")]
    prediction: usize,
}

/// Re-read the test CSV and write it as a TSV with a `Prediction` column.
///
/// `ID` is the zero-based row index in `test_csv`.
pub fn save_predictions(test_csv: &Path, predictions_file: &Path, y_pred: &[usize]) -> Result<()> {
    let records = load_comments(test_csv)?;
    if records.len() != y_pred.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} test records but {} predictions",
            records.len(),
            y_pred.len()
        )));
    }

    if let Some(parent) = predictions_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(predictions_file)
        .map_err(|e| Error::csv(predictions_file, e))?;

    for (id, (record, &prediction)) in records.iter().zip(y_pred).enumerate() {
        writer
            .serialize(PredictionRow {
                id,
                body: &record.body,
                removed: &record.removed,
                prediction,
            })
            .map_err(|e| Error::csv(predictions_file, e))?;
    }
    writer
        .flush()
        .map_err(|e| Error::io(predictions_file, e))?;

    info!(
        "Saved {} predictions to {}",
        y_pred.len(),
        predictions_file.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_predictions_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let test_csv = dir.path().join("test.csv");
        std::fs::write(
            &test_csv,
            "BODY,REMOVED\n\"hello, world\",0\nspam spam,1\nfine,0\n",
        )
        .unwrap();
        let out = dir.path().join("out/predictions.tsv");

        save_predictions(&test_csv, &out, &[0, 1, 1]).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "ID\tBODY\tREMOVED\tPrediction");
        assert_eq!(lines[1], "0\thello, world\t0\t0");
        assert_eq!(lines[3], "2\tfine\t0\t1");
    }

    #[test]
    fn test_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let test_csv = dir.path().join("test.csv");
        std::fs::write(&test_csv, "BODY,REMOVED\na,0\nb,1\n").unwrap();

        let result = save_predictions(&test_csv, &dir.path().join("p.tsv"), &[0]);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }
}
