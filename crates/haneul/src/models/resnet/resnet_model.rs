//! # `ResNet` Classifier
//!
//! Stem (``7x7/2`` conv, ``3x3/2`` max pool), four [`LayerBlock`]s of
//! widths ``stem_width * [1, 2, 4, 8]``, global average pool and a linear
//! head sized to the class count.

use crate::layers::blocks::conv_norm::{Conv2dNormBlock, Conv2dNormBlockConfig};
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig};
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Tensor};

/// ResNet-18 block depths.
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];

/// [`ResNet`] configuration.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Layer block depths.
    pub blocks: [usize; 4],

    /// Number of classification classes.
    pub num_classes: usize,

    /// Number of channels in the stem convolution.
    ///
    /// Layer widths are ``stem_width * [1, 2, 4, 8]``.
    #[config(default = 64)]
    pub stem_width: usize,
}

impl ResNetConfig {
    /// The `ResNet-18` layout.
    pub fn resnet18(num_classes: usize) -> Self {
        Self::new(RESNET18_BLOCKS, num_classes)
    }

    /// Width of the features entering the classifier.
    pub fn head_planes(&self) -> usize {
        self.stem_width * 8
    }

    /// Initialize a [`ResNet`] model.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet<B> {
        // 7x7 conv, /2
        let stem = Conv2dNormBlockConfig::square(3, self.stem_width, 7, 2);

        let width = self.stem_width;
        let layers = vec![
            LayerBlockConfig::build(self.blocks[0], width, width, 1),
            LayerBlockConfig::build(self.blocks[1], width, 2 * width, 2),
            LayerBlockConfig::build(self.blocks[2], 2 * width, 4 * width, 2),
            LayerBlockConfig::build(self.blocks[3], 4 * width, 8 * width, 2),
        ];

        ResNet {
            stem: stem.init(device),
            // 3x3 maxpool, /2
            stem_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),

            layers: layers.into_iter().map(|c| c.init(device)).collect(),

            head_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head: LinearConfig::new(self.head_planes(), self.num_classes).init(device),
        }
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Input conv/norm.
    pub stem: Conv2dNormBlock<B>,

    /// Input pool.
    pub stem_pool: MaxPool2d,

    /// Residual layers.
    pub layers: Vec<LayerBlock<B>>,

    /// Head pooling.
    pub head_pool: AdaptiveAvgPool2d,

    /// Head classifier.
    pub head: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// Output width of the classification layer.
    pub fn num_classes(&self) -> usize {
        let [_d_input, d_output] = self.head.weight.dims();
        d_output
    }

    /// `ResNet` forward pass.
    ///
    /// Maps ``[batch, 3, height, width]`` images to ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        // Prep block
        let x = self.stem.forward_relu(input);
        let x = self.stem_pool.forward(x);

        // Residual blocks
        let x = self.layers.iter().fold(x, |x, layer| layer.forward(x));

        // Head
        let x = self.head_pool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x = x.flatten::<2>(1, 3);
        self.head.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_resnet18_config() {
        let config = ResNetConfig::resnet18(11);
        assert_eq!(config.blocks, RESNET18_BLOCKS);
        assert_eq!(config.stem_width, 64);
        assert_eq!(config.head_planes(), 512);
    }

    #[test]
    fn test_resnet_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetConfig::new([1, 1, 1, 1], 5)
            .with_stem_width(4)
            .init(&device);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.layers.len(), 4);

        let output = model.forward(Tensor::ones([2, 3, 32, 32], &device));
        assert_eq!(output.dims(), [2, 5]);
    }
}
