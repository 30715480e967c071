//! Held-out evaluation: accuracy, classification report, confusion matrix

use crate::error::{FloodError, Result};
use crate::training::FloodPipeline;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// 2×2 counts laid out as `[[TN, FP], [FN, TP]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub matrix: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut matrix = [[0usize; 2]; 2];
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            let actual = usize::from(*t > 0.5);
            let predicted = usize::from(*p > 0.5);
            matrix[actual][predicted] += 1;
        }
        Self { matrix }
    }

    pub fn tn(&self) -> usize {
        self.matrix[0][0]
    }

    pub fn fp(&self) -> usize {
        self.matrix[0][1]
    }

    pub fn fn_(&self) -> usize {
        self.matrix[1][0]
    }

    pub fn tp(&self) -> usize {
        self.matrix[1][1]
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[{:>5} {:>5}]", self.tn(), self.fp())?;
        write!(f, " [{:>5} {:>5}]]", self.fn_(), self.tp())
    }
}

/// Precision / recall / F1 / support for one class or one average
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

impl ClassMetrics {
    fn from_counts(true_pos: usize, false_pos: usize, false_neg: usize) -> Self {
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        Self {
            precision,
            recall,
            f1_score: f1(precision, recall),
            support: true_pos + false_neg,
        }
    }
}

/// Per-class and averaged metrics. Serializes with the keys
/// `"0"`, `"1"`, `"accuracy"`, `"macro avg"` and `"weighted avg"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(rename = "0")]
    pub negative: ClassMetrics,
    #[serde(rename = "1")]
    pub positive: ClassMetrics,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let negative = ClassMetrics::from_counts(cm.tn(), cm.fn_(), cm.fp());
        let positive = ClassMetrics::from_counts(cm.tp(), cm.fp(), cm.fn_());
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1_score: (negative.f1_score + positive.f1_score) / 2.0,
            support: total,
        };

        let weight = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * negative.support as f64 + b * positive.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(negative.precision, positive.precision),
            recall: weight(negative.recall, positive.recall),
            f1_score: weight(negative.f1_score, positive.f1_score),
            support: total,
        };

        Self {
            negative,
            positive,
            accuracy: ratio(cm.tn() + cm.tp(), total),
            macro_avg,
            weighted_avg,
        }
    }

    /// Look up a row by its report key
    pub fn get(&self, key: &str) -> Option<&ClassMetrics> {
        match key {
            "0" => Some(&self.negative),
            "1" => Some(&self.positive),
            "macro avg" => Some(&self.macro_avg),
            "weighted avg" => Some(&self.weighted_avg),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = "weighted avg".len();
        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (label, m) in [("0", &self.negative), ("1", &self.positive)] {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (label, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        Ok(())
    }
}

/// Result of scoring a model on held-out data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
}

impl Evaluation {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(FloodError::Training(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let confusion = ConfusionMatrix::from_labels(y_true, y_pred);
        let report = ClassificationReport::from_confusion(&confusion);
        Ok(Self {
            accuracy: report.accuracy,
            report,
            confusion,
        })
    }
}

/// Fraction of matching labels; 0.0 for empty input
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    ratio(correct, y_true.len())
}

/// Scores a fitted pipeline on a held-out split
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        pipeline: &FloodPipeline,
        x_test: &DataFrame,
        y_test: &Array1<f64>,
    ) -> Result<Evaluation> {
        let predictions = pipeline.predict(x_test)?;
        let evaluation = Evaluation::from_predictions(y_test, &predictions)?;
        info!(
            accuracy = evaluation.accuracy,
            macro_f1 = evaluation.report.macro_avg.f1_score,
            test_size = y_test.len(),
            "Evaluated model"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_layout() {
        let y_true = array![0.0, 0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 0.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        assert_eq!(cm.matrix, [[2, 1], [1, 1]]);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_report_values() {
        let y_true = array![0.0, 0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 0.0, 1.0, 0.0];
        let eval = Evaluation::from_predictions(&y_true, &y_pred).unwrap();

        assert!((eval.accuracy - 0.6).abs() < 1e-12);
        let r = &eval.report;
        assert!((r.negative.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((r.negative.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((r.positive.precision - 0.5).abs() < 1e-12);
        assert_eq!(r.negative.support, 3);
        assert_eq!(r.positive.support, 2);
        let expected_macro = (2.0 / 3.0 + 0.5) / 2.0;
        assert!((r.macro_avg.precision - expected_macro).abs() < 1e-12);
        let expected_weighted = (2.0 / 3.0 * 3.0 + 0.5 * 2.0) / 5.0;
        assert!((r.weighted_avg.recall - expected_weighted).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let y_true = array![0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let eval = Evaluation::from_predictions(&y_true, &y_pred).unwrap();
        assert_eq!(eval.report.positive.precision, 0.0);
        assert_eq!(eval.report.positive.f1_score, 0.0);
    }

    #[test]
    fn test_report_keys() {
        let eval = Evaluation::from_predictions(&array![0.0, 1.0], &array![0.0, 1.0]).unwrap();
        let json = eval.report.to_json();
        for key in ["0", "1", "macro avg", "weighted avg", "accuracy"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["macro avg"]["f1-score"], 1.0);

        let text = eval.report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_accuracy_score() {
        assert_eq!(accuracy_score(&array![1.0, 0.0], &array![1.0, 1.0]), 0.5);
        assert_eq!(accuracy_score(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }
}
