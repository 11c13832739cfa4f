//! CNN Architecture for Grain Classification
//!
//! A configurable convolutional network built with Burn. The depth
//! (`num_blocks`) and width (`n_features`) come from the model config, and
//! the `ConvNetScale` variant fuses each sample's scalar scale feature into
//! the classifier head alongside the pooled convolutional features.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

use super::config::{ModelConfig, ModelKind};

/// Hidden width of the classifier head
const HEAD_UNITS: usize = 256;

/// A CNN block: Conv2d, BatchNorm, ReLU, MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block; halves both spatial dimensions
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Grain kernel classifier
///
/// Architecture:
/// - `num_blocks` convolutional blocks, filter count doubling per block
/// - Global average pooling
/// - Optional concatenation of the scalar scale feature
/// - Two-layer classifier head with dropout
#[derive(Module, Debug)]
pub struct GrainClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
    scale_fused: bool,
}

impl<B: Backend> GrainClassifier<B> {
    /// Build a classifier from configuration
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.num_blocks);
        let mut in_channels = config.in_channels;
        let mut out_channels = config.n_features;

        for _ in 0..config.num_blocks {
            blocks.push(ConvBlock::new(in_channels, out_channels, device));
            in_channels = out_channels;
            out_channels *= 2;
        }

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let scale_fused = config.kind == ModelKind::ConvNetScale;
        let head_inputs = config.final_filters() + usize::from(scale_fused);

        let fc1 = LinearConfig::new(head_inputs, HEAD_UNITS).init(device);
        let dropout = DropoutConfig::new(config.droprate).init();
        let fc2 = LinearConfig::new(HEAD_UNITS, config.num_classes).init(device);

        Self {
            blocks,
            global_pool,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
            scale_fused,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `images` - Input tensor of shape [batch_size, 3, height, width]
    /// * `scales` - Per-sample scale features of shape [batch_size]; only
    ///   consumed by the scale-fused variant (ones are substituted when absent)
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>, scales: Option<Tensor<B, 1>>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }

        // Global pooling: [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = if self.scale_fused {
            let scales = scales
                .unwrap_or_else(|| Tensor::ones([batch_size], &x.device()))
                .reshape([batch_size, 1]);
            Tensor::cat(vec![x, scales], 1)
        } else {
            x
        };

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(
        &self,
        images: Tensor<B, 4>,
        scales: Option<Tensor<B, 1>>,
    ) -> Tensor<B, 2> {
        let logits = self.forward(images, scales);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Whether this model consumes the scale feature
    pub fn is_scale_fused(&self) -> bool {
        self.scale_fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_config(kind: ModelKind) -> ModelConfig {
        ModelConfig {
            kind,
            num_classes: 5,
            height: 32,
            width: 16,
            n_features: 4,
            num_blocks: 2,
            droprate: 0.5,
            in_channels: 3,
        }
    }

    #[test]
    fn test_convnet_output_shape() {
        let device = Default::default();
        let model = GrainClassifier::<TestBackend>::new(&small_config(ModelKind::ConvNet), &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 16], &device);
        let output = model.forward(input, None);

        assert_eq!(output.dims(), [2, 5]);
        assert!(!model.is_scale_fused());
    }

    #[test]
    fn test_convnet_scale_output_shape() {
        let device = Default::default();
        let model =
            GrainClassifier::<TestBackend>::new(&small_config(ModelKind::ConvNetScale), &device);

        let input = Tensor::<TestBackend, 4>::zeros([3, 3, 32, 16], &device);
        let scales = Tensor::<TestBackend, 1>::from_floats([1.0, 0.5, 2.0], &device);
        let output = model.forward(input, Some(scales));

        assert_eq!(output.dims(), [3, 5]);
        assert!(model.is_scale_fused());
    }

    #[test]
    fn test_scale_fused_substitutes_ones() {
        let device = Default::default();
        let model =
            GrainClassifier::<TestBackend>::new(&small_config(ModelKind::ConvNetScale), &device);

        // No scales supplied: forward still produces valid logits.
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 16], &device);
        let output = model.forward(input, None);
        assert_eq!(output.dims(), [1, 5]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let model = GrainClassifier::<TestBackend>::new(&small_config(ModelKind::ConvNet), &device);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 16],
            burn::tensor::Distribution::Default,
            &device,
        );
        let probs = model.forward_softmax(input, None);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();

        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }
}
