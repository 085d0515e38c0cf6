//! Small analytic classifiers for attribution tests.

use burn::prelude::*;
use burn::tensor::activation::sigmoid;

pub use histoxai_core::backend::{Autodiff, NdArray};
use histoxai_core::BinaryClassifier;

pub type B = NdArray;
pub type AD = Autodiff<NdArray>;

/// Image whose values increase along rows and columns, offset per channel.
pub fn ramp_image<Bk: Backend>(c: usize, h: usize, w: usize, device: &Bk::Device) -> Tensor<Bk, 3> {
    let data: Vec<f32> = (0..c * h * w)
        .map(|i| {
            let ch = i / (h * w);
            let px = i % (h * w);
            ch as f32 * 0.1 + px as f32 / (h * w) as f32
        })
        .collect();
    Tensor::<Bk, 1>::from_floats(data.as_slice(), device).reshape([c, h, w])
}

/// Always answers the same probability.
pub struct ConstantProbe(pub f32);

impl<Bk: Backend> BinaryClassifier<Bk> for ConstantProbe {
    fn features(&self, images: Tensor<Bk, 4>) -> Tensor<Bk, 4> {
        images
    }

    fn head(&self, features: Tensor<Bk, 4>) -> Tensor<Bk, 2> {
        let [n, ..] = features.dims();
        Tensor::ones([n, 1], &features.device()).mul_scalar(self.0)
    }
}

/// Identity trunk; the head is a logistic regression on channel means.
pub struct PooledProbe<Bk: Backend> {
    weights: Tensor<Bk, 2>,
}

impl<Bk: Backend> PooledProbe<Bk> {
    pub fn new<const C: usize>(weights: [f32; C], device: &Bk::Device) -> Self {
        Self {
            weights: Tensor::<Bk, 1>::from_floats(weights, device).reshape([C, 1]),
        }
    }
}

impl<Bk: Backend> BinaryClassifier<Bk> for PooledProbe<Bk> {
    fn features(&self, images: Tensor<Bk, 4>) -> Tensor<Bk, 4> {
        images
    }

    fn head(&self, features: Tensor<Bk, 4>) -> Tensor<Bk, 2> {
        let [n, c, _, _] = features.dims();
        let pooled = features.mean_dim(3).mean_dim(2).reshape([n, c]);
        sigmoid(pooled.matmul(self.weights.clone()))
    }
}

/// Identity trunk; the head is a logistic regression on every pixel.
pub struct LogisticProbe<Bk: Backend> {
    weights: Tensor<Bk, 4>,
    bias: f32,
}

impl<Bk: Backend> LogisticProbe<Bk> {
    pub fn new(weights: Vec<f32>, shape: [usize; 3], bias: f32, device: &Bk::Device) -> Self {
        let [c, h, w] = shape;
        Self {
            weights: Tensor::<Bk, 1>::from_floats(weights.as_slice(), device).reshape([1, c, h, w]),
            bias,
        }
    }

    /// Weights alternating between +0.5 and -0.5.
    pub fn checkerboard(c: usize, h: usize, w: usize, device: &Bk::Device) -> Self {
        let weights = (0..c * h * w).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        Self::new(weights, [c, h, w], 0.1, device)
    }
}

impl<Bk: Backend> BinaryClassifier<Bk> for LogisticProbe<Bk> {
    fn features(&self, images: Tensor<Bk, 4>) -> Tensor<Bk, 4> {
        images
    }

    fn head(&self, features: Tensor<Bk, 4>) -> Tensor<Bk, 2> {
        let [n, c, h, w] = features.dims();
        let logits = (features * self.weights.clone())
            .reshape([n, c * h * w])
            .sum_dim(1)
            .add_scalar(self.bias);
        sigmoid(logits)
    }
}
