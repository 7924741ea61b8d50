//! Experiment driver: encode-or-load, fit, persist and evaluate.

use crate::cache::{encode_or_load_data, LabeledMatrix};
use crate::classifiers::{build_classifier, load_model, save_model, Classifier, Model};
use crate::config::Config;
use crate::data::{CommentDataset, TARGET_NAMES};
use crate::error::Result;
use crate::logging::timed;
use crate::metrics::{classification_report, roc_auc_score, roc_curves, ClassificationReport, RocCurve};
use crate::plotting::plot_roc;
use crate::predictions::save_predictions;
use ndarray::Array2;
use serde::Serialize;
use tracing::{info, warn};

pub use crate::cache::encode_text;

/// Everything computed while evaluating a fitted model on the test split.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Mean test accuracy
    pub score: f64,
    pub report: ClassificationReport,
    /// ROC AUC of the positive-class probability
    pub roc_auc: f64,
    pub roc_curves: Vec<RocCurve>,
    pub predictions: Vec<usize>,
}

/// Load the configured train and test CSV files.
pub fn load_dataset(config: &Config) -> Result<CommentDataset> {
    timed("load_dataset", || {
        CommentDataset::load(&config.data.train_file, &config.data.test_file)
    })
}

/// Build the configured classifier, fit it on `train`, save it and evaluate
/// it on `test`.
pub fn make_classifier_and_predict(
    config: &Config,
    train: &LabeledMatrix,
    test: &LabeledMatrix,
    target_names: &[&str],
) -> Result<(Model, EvaluationReport)> {
    timed("make_classifier_and_predict", || -> Result<(Model, EvaluationReport)> {
        info!("Train shape: {:?}", train.x.dim());
        info!("Test shape: {:?}", test.x.dim());

        let mut clf = build_classifier(&config.classifier);
        info!("Fitting {} classifier", clf.kind());
        timed("fit", || clf.fit(&train.x, &train.y))?;

        save_model(&clf, &config.model_path())?;

        let report = eval_model(config, &clf, &test.x, &test.y, target_names)?;
        Ok((clf, report))
    })
}

/// Score a fitted classifier on the test split, print its report, plot its
/// ROC curves and write the predictions file.
pub fn eval_model(
    config: &Config,
    clf: &dyn Classifier,
    x_test: &Array2<f32>,
    y_test: &[usize],
    target_names: &[&str],
) -> Result<EvaluationReport> {
    timed("eval_model", || -> Result<EvaluationReport> {
        let predictions = clf.predict(x_test)?;
        let proba = clf.predict_proba(x_test)?;

        let score = crate::metrics::accuracy(y_test, &predictions);
        info!("Test score: {:.4}", score);

        let report = classification_report(y_test, &predictions, target_names);
        println!("\n{}", report);

        if !y_test.contains(&1) || !y_test.contains(&0) {
            warn!("Test split contains a single class; ROC AUC is not meaningful");
        }
        let positive: Vec<bool> = y_test.iter().map(|&y| y == 1).collect();
        let scores: Vec<f64> = proba.column(1).iter().map(|&p| p as f64).collect();
        let roc_auc = roc_auc_score(&positive, &scores);
        info!("ROC AUC: {:.4}", roc_auc);

        let curves = roc_curves(y_test, &proba, target_names);
        plot_roc(&curves, &config.roc_plot_path())?;

        save_predictions(
            &config.data.test_file,
            &config.output.predictions_file,
            &predictions,
        )?;

        Ok(EvaluationReport {
            score,
            report,
            roc_auc,
            roc_curves: curves,
            predictions,
        })
    })
}

/// Default workflow: encode or load both splits, then fit and evaluate.
pub fn run_train(config: &Config) -> Result<EvaluationReport> {
    info!(
        "Running {} classifier on {} encodings",
        config.classifier.clf_type, config.encoder.encoder_type
    );
    let dataset = load_dataset(config)?;
    let (train, test) = encode_or_load_data(&config.encoder, &config.output.workdir, &dataset)?;
    let (_, report) = make_classifier_and_predict(config, &train, &test, &TARGET_NAMES)?;
    Ok(report)
}

/// Populate the encoding cache without training anything.
pub fn run_encode(config: &Config) -> Result<(LabeledMatrix, LabeledMatrix)> {
    let dataset = load_dataset(config)?;
    encode_or_load_data(&config.encoder, &config.output.workdir, &dataset)
}

/// Evaluate the previously saved model on the (cached) test split.
pub fn run_evaluate(config: &Config) -> Result<EvaluationReport> {
    let dataset = load_dataset(config)?;
    let (_, test) = encode_or_load_data(&config.encoder, &config.output.workdir, &dataset)?;
    let clf = load_model(&config.model_path())?;
    eval_model(config, &clf, &test.x, &test.y, &TARGET_NAMES)
}
