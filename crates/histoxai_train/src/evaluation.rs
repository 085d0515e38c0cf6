//! Model evaluation utilities.
//!
//! Evaluation is a pure function of a frozen model and a loader: the caller
//! passes the inner (non-autodiff) module and a closure returning
//! positive-class probabilities.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use histoxai_data::PatchLoader;

/// Probability at or below which a sample is predicted negative.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Confusion matrix of a binary classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusionMatrix {
    /// True positives.
    pub tp: usize,
    /// False positives.
    pub fp: usize,
    /// True negatives.
    pub tn: usize,
    /// False negatives.
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl BinaryConfusionMatrix {
    /// Build from 0/1 predictions and targets.
    pub fn from_predictions(predictions: &[u8], targets: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&pred, &target) in predictions.iter().zip(targets) {
            match (target, pred) {
                (1, 1) => cm.tp += 1,
                (0, 1) => cm.fp += 1,
                (0, 0) => cm.tn += 1,
                _ => cm.fn_ += 1,
            }
        }
        cm
    }

    /// Total number of samples.
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Get accuracy.
    pub fn accuracy(&self) -> f32 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision of the positive class.
    pub fn precision(&self) -> f32 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall of the positive class.
    pub fn recall(&self) -> f32 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Specificity (recall of the negative class).
    pub fn specificity(&self) -> f32 {
        ratio(self.tn, self.tn + self.fp)
    }

    /// F1 score of the positive class.
    pub fn f1(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Get a formatted string representation.
    pub fn to_table(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("{:>9}{:>7}{:>7}\n", "", "P0", "P1"));
        s.push_str(&format!("   {:<6}{:>7}{:>7}\n", "T0", self.tn, self.fp));
        s.push_str(&format!("   {:<6}{:>7}{:>7}\n", "T1", self.fn_, self.tp));
        s
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// Evaluation results with per-sample outputs and the confusion matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Positive-class probabilities.
    pub probabilities: Vec<f32>,
    /// Thresholded predictions.
    pub predictions: Vec<u8>,
    /// True labels.
    pub targets: Vec<u8>,
    /// Aggregated counts.
    pub confusion: BinaryConfusionMatrix,
}

impl EvaluationResult {
    /// Build a result from probabilities and labels, thresholding at 0.5.
    pub fn from_probabilities(probabilities: Vec<f32>, targets: Vec<u8>) -> Self {
        let predictions: Vec<u8> = probabilities
            .iter()
            .map(|&p| u8::from(p > DECISION_THRESHOLD))
            .collect();
        let confusion = BinaryConfusionMatrix::from_predictions(&predictions, &targets);
        Self {
            probabilities,
            predictions,
            targets,
            confusion,
        }
    }

    /// Get accuracy.
    pub fn accuracy(&self) -> f32 {
        self.confusion.accuracy()
    }

    /// Area under the ROC curve, or `None` when only one class is present.
    ///
    /// Computed as the Mann-Whitney statistic with tied scores counted half.
    pub fn roc_auc(&self) -> Option<f32> {
        let mut order: Vec<usize> = (0..self.probabilities.len()).collect();
        order.sort_by(|&a, &b| self.probabilities[a].total_cmp(&self.probabilities[b]));

        // Average 1-based ranks over runs of tied scores.
        let mut ranks = vec![0.0f64; order.len()];
        let mut i = 0;
        while i < order.len() {
            let mut j = i;
            while j + 1 < order.len() && self.probabilities[order[j + 1]] == self.probabilities[order[i]] {
                j += 1;
            }
            let rank = (i + j) as f64 / 2.0 + 1.0;
            for &k in &order[i..=j] {
                ranks[k] = rank;
            }
            i = j + 1;
        }

        let n_pos = self.targets.iter().filter(|&&t| t == 1).count();
        let n_neg = self.targets.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return None;
        }

        let pos_rank_sum: f64 = self
            .targets
            .iter()
            .zip(&ranks)
            .filter(|(&t, _)| t == 1)
            .map(|(_, &r)| r)
            .sum();
        let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
        Some((u / (n_pos * n_neg) as f64) as f32)
    }

    /// Print confusion matrix and a per-class report.
    pub fn print_report(&self) {
        let cm = &self.confusion;
        println!("\nConfusion Matrix (T=True, P=Predicted):");
        println!("{}", cm.to_table());

        let negative = BinaryConfusionMatrix {
            tp: cm.tn,
            fp: cm.fn_,
            tn: cm.tp,
            fn_: cm.fp,
        };
        println!("{:<10} {:>10} {:>10} {:>10} {:>9}", "Class", "Precision", "Recall", "F1", "Support");
        println!("{}", "-".repeat(53));
        for (name, m) in [("0", &negative), ("1", cm)] {
            println!(
                "{:<10} {:>9.2}% {:>9.2}% {:>9.2}% {:>9}",
                name,
                m.precision() * 100.0,
                m.recall() * 100.0,
                m.f1() * 100.0,
                m.tp + m.fn_
            );
        }
        println!("{}", "-".repeat(53));
        println!("{:<10} {:>43.2}%", "Accuracy", cm.accuracy() * 100.0);
    }
}

/// Evaluate a binary classifier over every batch of a loader.
///
/// # Arguments
///
/// * `model` - The frozen model, on an inference backend
/// * `loader` - Loader over the split to evaluate
/// * `device` - Device for the batches
/// * `predict_fn` - Returns positive-class probabilities of shape (N, 1)
pub fn evaluate_binary<B, M, F>(
    model: &M,
    loader: &PatchLoader,
    device: &B::Device,
    predict_fn: F,
) -> Result<EvaluationResult>
where
    B: Backend,
    F: Fn(&M, Tensor<B, 4>) -> Tensor<B, 2>,
{
    let mut probabilities = Vec::with_capacity(loader.len());
    let mut targets = Vec::with_capacity(loader.len());

    for batch_result in loader.iter::<B>(device) {
        let batch = batch_result?;
        let probs = predict_fn(model, batch.images);

        probabilities.extend(probs.into_data().iter::<f32>());
        for &idx in &batch.indices {
            targets.push(loader.dataset().label(idx)?);
        }
    }

    let result = EvaluationResult::from_probabilities(probabilities, targets);
    tracing::info!(
        split = %loader.split(),
        samples = result.confusion.total(),
        accuracy = result.accuracy(),
        "evaluation complete"
    );
    Ok(result)
}
