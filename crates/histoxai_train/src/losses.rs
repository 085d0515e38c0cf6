//! Binary classification loss.

use burn::prelude::*;
use burn::tensor::activation::relu;

/// Binary cross-entropy on logits.
///
/// Uses the stable form `max(z, 0) - z·y + log(1 + exp(-|z|))`, which never
/// exponentiates a positive number.
#[derive(Debug, Default, Clone, Copy)]
pub struct BceWithLogitsLoss;

impl BceWithLogitsLoss {
    /// Create a new loss.
    pub fn new() -> Self {
        Self
    }

    /// Per-sample loss of shape (N, 1).
    pub fn forward_no_reduction<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 2> {
        let softplus_neg_abs = logits.clone().abs().neg().exp().log1p();
        relu(logits.clone()) - logits * targets + softplus_neg_abs
    }

    /// Mean loss over the batch.
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward_no_reduction(logits, targets).mean()
    }
}

/// Number of samples whose logit sign matches the 0/1 target.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let preds = logits.greater_elem(0.0).float();
    let correct: i64 = preds.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use histoxai_core::backend::NdArray;

    type B = NdArray;

    fn reference(z: f32, y: f32) -> f32 {
        let p = 1.0 / (1.0 + (-z).exp());
        -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
    }

    #[test]
    fn test_bce_matches_reference() {
        let device = Default::default();
        let z = [-2.0f32, -0.5, 0.0, 0.7, 3.0];
        let y = [0.0f32, 1.0, 1.0, 0.0, 1.0];
        let logits = Tensor::<B, 1>::from_floats(z, &device).reshape([5, 1]);
        let targets = Tensor::<B, 1>::from_floats(y, &device).reshape([5, 1]);

        let per_sample: Vec<f32> = BceWithLogitsLoss::new()
            .forward_no_reduction(logits.clone(), targets.clone())
            .into_data()
            .to_vec()
            .unwrap();
        for i in 0..5 {
            assert!((per_sample[i] - reference(z[i], y[i])).abs() < 1e-5);
        }

        let mean = BceWithLogitsLoss::new().forward(logits, targets).into_scalar();
        let expected: f32 = (0..5).map(|i| reference(z[i], y[i])).sum::<f32>() / 5.0;
        assert!((mean - expected).abs() < 1e-5);
    }

    #[test]
    fn test_bce_is_finite_for_large_logits() {
        let device = Default::default();
        let logits = Tensor::<B, 1>::from_floats([200.0, -200.0], &device).reshape([2, 1]);
        let targets = Tensor::<B, 1>::from_floats([0.0, 1.0], &device).reshape([2, 1]);

        let losses: Vec<f32> = BceWithLogitsLoss::new()
            .forward_no_reduction(logits, targets)
            .into_data()
            .to_vec()
            .unwrap();
        assert!(losses.iter().all(|l| l.is_finite()));
        assert!((losses[0] - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_count_correct() {
        let device = Default::default();
        let logits = Tensor::<B, 1>::from_floats([1.5, -0.2, 0.3, -4.0], &device).reshape([4, 1]);
        let targets = Tensor::<B, 1>::from_floats([1.0, 1.0, 1.0, 0.0], &device).reshape([4, 1]);
        assert_eq!(count_correct(logits, targets), 3);
    }
}
