//! Classification metrics: accuracy, per-class report and ROC analysis.

use ndarray::{Array2, Axis};
use serde::Serialize;
use std::fmt;

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with macro and weighted averages.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    target_names: &[&str],
) -> ClassificationReport {
    let n_classes = target_names
        .len()
        .max(y_true.iter().chain(y_pred).copied().max().map_or(0, |m| m + 1));

    let mut classes = Vec::with_capacity(n_classes);
    for class in 0..n_classes {
        let tp = y_true
            .iter()
            .zip(y_pred)
            .filter(|(&t, &p)| t == class && p == class)
            .count();
        let predicted = y_pred.iter().filter(|&&p| p == class).count();
        let support = y_true.iter().filter(|&&t| t == class).count();

        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        classes.push(ClassMetrics {
            name: target_names
                .get(class)
                .map(|s| s.to_string())
                .unwrap_or_else(|| class.to_string()),
            precision,
            recall,
            f1: f1(precision, recall),
            support,
        });
    }

    let total: usize = classes.iter().map(|c| c.support).sum();
    let k = classes.len().max(1) as f64;
    let macro_avg = ClassMetrics {
        name: "macro avg".to_string(),
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / k,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / k,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / k,
        support: total,
    };
    let weight = |f: fn(&ClassMetrics) -> f64| {
        classes
            .iter()
            .map(|c| f(c) * c.support as f64)
            .sum::<f64>()
            / total.max(1) as f64
    };
    let weighted_avg = ClassMetrics {
        name: "weighted avg".to_string(),
        precision: weight(|c| c.precision),
        recall: weight(|c| c.recall),
        f1: weight(|c| c.f1),
        support: total,
    };

    ClassificationReport {
        accuracy: accuracy(y_true, y_pred),
        classes,
        macro_avg,
        weighted_avg,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        )?;
        let row = |f: &mut fmt::Formatter<'_>, c: &ClassMetrics| {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.name, c.precision, c.recall, c.f1, c.support
            )
        };
        for class in &self.classes {
            row(f, class)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}

/// Points of a receiver operating characteristic curve.
#[derive(Debug, Clone, Serialize)]
pub struct RocCurve {
    pub label: String,
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub auc: f64,
}

/// ROC curve for binary targets and scores (higher = more positive).
///
/// Tied scores form a single point. The curve starts at `(0, 0)` with an
/// infinite threshold. Returns `(fpr, tpr, thresholds)`.
pub fn roc_curve(y_true: &[bool], scores: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let positives = y_true.iter().filter(|&&t| t).count() as f64;
    let negatives = y_true.len() as f64 - positives;

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0.0, 0.0);

    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_tie {
            fpr.push(if negatives > 0.0 { fp / negatives } else { 0.0 });
            tpr.push(if positives > 0.0 { tp / positives } else { 0.0 });
            thresholds.push(scores[idx]);
        }
    }
    (fpr, tpr, thresholds)
}

/// Area under a curve with the trapezoidal rule.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Area under the ROC curve of `scores` for the positive class.
pub fn roc_auc_score(y_true: &[bool], scores: &[f64]) -> f64 {
    let (fpr, tpr, _) = roc_curve(y_true, scores);
    auc(&fpr, &tpr)
}

/// Per-class one-vs-rest ROC curves plus the micro-average over the one-hot
/// label matrix.
pub fn roc_curves(y_true: &[usize], proba: &Array2<f32>, target_names: &[&str]) -> Vec<RocCurve> {
    let n_classes = proba.ncols();
    let mut curves = Vec::with_capacity(n_classes + 1);

    for class in 0..n_classes {
        let truth: Vec<bool> = y_true.iter().map(|&t| t == class).collect();
        let scores: Vec<f64> = proba.column(class).iter().map(|&p| p as f64).collect();
        let (fpr, tpr, thresholds) = roc_curve(&truth, &scores);
        curves.push(RocCurve {
            label: target_names
                .get(class)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("class {class}")),
            auc: auc(&fpr, &tpr),
            fpr,
            tpr,
            thresholds,
        });
    }

    let mut truth = Vec::with_capacity(proba.len());
    let mut scores = Vec::with_capacity(proba.len());
    for (row, &label) in proba.axis_iter(Axis(0)).zip(y_true) {
        for (class, &p) in row.iter().enumerate() {
            truth.push(label == class);
            scores.push(p as f64);
        }
    }
    let (fpr, tpr, thresholds) = roc_curve(&truth, &scores);
    curves.push(RocCurve {
        label: "micro-average".to_string(),
        auc: auc(&fpr, &tpr),
        fpr,
        tpr,
        thresholds,
    });
    curves
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_classification_report_values() {
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 0, 1, 1, 0];
        let report = classification_report(&y_true, &y_pred, &["kept", "removed"]);

        let kept = &report.classes[0];
        assert_abs_diff_eq!(kept.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(kept.recall, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(kept.support, 3);

        let removed = &report.classes[1];
        assert_abs_diff_eq!(removed.precision, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(removed.recall, 0.5, epsilon = 1e-12);

        assert_abs_diff_eq!(report.accuracy, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(report.macro_avg.f1, (2.0 / 3.0 + 0.5) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            report.weighted_avg.recall,
            (3.0 * 2.0 / 3.0 + 2.0 * 0.5) / 5.0,
            epsilon = 1e-12
        );

        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("removed"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_report_without_predictions_for_class() {
        let report = classification_report(&[0, 1], &[0, 0], &["kept", "removed"]);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }

    #[test]
    fn test_roc_curve_points() {
        let y = [false, false, true, true];
        let scores = [0.1, 0.4, 0.35, 0.8];
        let (fpr, tpr, thresholds) = roc_curve(&y, &scores);

        assert_eq!(fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(thresholds[1..], [0.8, 0.4, 0.35, 0.1]);
        assert_abs_diff_eq!(auc(&fpr, &tpr), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_roc_ties_collapse() {
        let (fpr, tpr, _) = roc_curve(&[true, false], &[0.5, 0.5]);
        assert_eq!(fpr, vec![0.0, 1.0]);
        assert_eq!(tpr, vec![0.0, 1.0]);
        assert_abs_diff_eq!(roc_auc_score(&[true, false], &[0.5, 0.5]), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_scores() {
        assert_abs_diff_eq!(
            roc_auc_score(&[false, true, false, true], &[0.1, 0.9, 0.2, 0.7]),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_roc_curves_include_micro_average() {
        let proba = array![[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4]];
        let curves = roc_curves(&[0, 1, 1], &proba, &["kept", "removed"]);
        assert_eq!(curves.len(), 3);
        assert_eq!(curves[1].label, "removed");
        assert_eq!(curves[2].label, "micro-average");
        assert_abs_diff_eq!(curves[1].auc, 1.0, epsilon = 1e-12);
    }
}
