//! Small VGG-style CNN for binary patch classification.
//!
//! Four 3×3 convolution stages with batch normalization, max-pooling after
//! the first two, adaptive average pooling and a two-layer head producing a
//! single logit.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use serde::{Deserialize, Serialize};

use histoxai_core::BinaryClassifier;

/// Configuration for the patch CNN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchCnnConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Output channels of the four convolution stages.
    pub channels: [usize; 4],
    /// Side of the adaptive average pool output.
    pub pooled_size: usize,
    /// Width of the hidden fully connected layer.
    pub hidden: usize,
    /// Dropout probability before the output layer.
    pub dropout: f64,
}

impl Default for PatchCnnConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            channels: [32, 64, 128, 128],
            pooled_size: 4,
            hidden: 128,
            dropout: 0.5,
        }
    }
}

impl PatchCnnConfig {
    /// Create a new config for the given number of input channels.
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            ..Default::default()
        }
    }

    /// Set the output channels of the convolution stages.
    #[must_use]
    pub fn with_channels(mut self, channels: [usize; 4]) -> Self {
        self.channels = channels;
        self
    }

    /// Set the adaptive pool output side.
    #[must_use]
    pub fn with_pooled_size(mut self, pooled_size: usize) -> Self {
        self.pooled_size = pooled_size;
        self
    }

    /// Set the hidden layer width.
    #[must_use]
    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the dropout probability.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PatchCnn<B> {
        PatchCnn::new(self.clone(), device)
    }
}

/// A convolution stage: Conv2d(3×3, pad 1) -> BatchNorm -> ReLU
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvStage<B> {
    /// Create a new convolution stage.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let bn = BatchNormConfig::new(out_channels).init(device);

        Self { conv, bn }
    }

    /// Forward pass with batch statistics on autodiff backends.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = self.bn.forward(out);
        Relu::new().forward(out)
    }

    /// Forward pass normalizing with the stored running statistics.
    pub fn forward_frozen(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let [_, c, _, _] = out.dims();

        let mean = self.bn.running_mean.value().reshape([1, c, 1, 1]);
        let var = self.bn.running_var.value().reshape([1, c, 1, 1]);
        let gamma = self.bn.gamma.val().reshape([1, c, 1, 1]);
        let beta = self.bn.beta.val().reshape([1, c, 1, 1]);

        let out = out.sub(mean).div(var.add_scalar(self.bn.epsilon).sqrt());
        Relu::new().forward(out.mul(gamma).add(beta))
    }
}

/// Binary patch classifier.
///
/// Architecture (defaults, 96×96 input):
/// - Stage 1: 3 -> 32, max-pool 2×2 (48×48)
/// - Stage 2: 32 -> 64, max-pool 2×2 (24×24)
/// - Stage 3: 64 -> 128
/// - Stage 4: 128 -> 128 (feature map used by Grad-CAM)
/// - Adaptive average pool to 4×4, flatten
/// - Linear(2048, 128) -> ReLU -> Dropout(0.5) -> Linear(128, 1)
///
/// [`PatchCnn::forward`] returns logits with training semantics. The
/// [`BinaryClassifier`] implementation is the frozen path: running batch norm
/// statistics and no dropout, on every backend.
///
/// # Example
///
/// ```rust,ignore
/// use histoxai_models::PatchCnnConfig;
///
/// let model = PatchCnnConfig::default().init::<NdArray>(&device);
/// let logits = model.forward(images); // (N, 1)
/// let probs = model.predict_proba(images); // (N, 1), frozen
/// ```
#[derive(Module, Debug)]
pub struct PatchCnn<B: Backend> {
    stage1: ConvStage<B>,
    stage2: ConvStage<B>,
    stage3: ConvStage<B>,
    stage4: ConvStage<B>,
    pool: MaxPool2d,
    gap: AdaptiveAvgPool2d,
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
}

impl<B: Backend> PatchCnn<B> {
    /// Create a new patch CNN.
    pub fn new(config: PatchCnnConfig, device: &B::Device) -> Self {
        let [c1, c2, c3, c4] = config.channels;
        let pooled = config.pooled_size;

        Self {
            stage1: ConvStage::new(config.in_channels, c1, device),
            stage2: ConvStage::new(c1, c2, device),
            stage3: ConvStage::new(c2, c3, device),
            stage4: ConvStage::new(c3, c4, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            gap: AdaptiveAvgPool2dConfig::new([pooled, pooled]).init(),
            fc1: LinearConfig::new(c4 * pooled * pooled, config.hidden).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            fc2: LinearConfig::new(config.hidden, 1).init(device),
        }
    }

    /// Training forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, channels, height, width)
    ///
    /// # Returns
    ///
    /// Logits of shape (batch, 1)
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.pool.forward(self.stage1.forward(x));
        let out = self.pool.forward(self.stage2.forward(out));
        let out = self.stage3.forward(out);
        let out = self.stage4.forward(out);

        let out = self.gap.forward(out).flatten::<2>(1, 3);
        let out = Relu::new().forward(self.fc1.forward(out));
        self.fc2.forward(self.dropout.forward(out))
    }

    fn logits_frozen(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(features).flatten::<2>(1, 3);
        let out = Relu::new().forward(self.fc1.forward(out));
        self.fc2.forward(out)
    }
}

impl<B: Backend> BinaryClassifier<B> for PatchCnn<B> {
    fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.pool.forward(self.stage1.forward_frozen(images));
        let out = self.pool.forward(self.stage2.forward_frozen(out));
        let out = self.stage3.forward_frozen(out);
        self.stage4.forward_frozen(out)
    }

    fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.logits_frozen(features))
    }
}
