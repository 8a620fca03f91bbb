//! # `ConvNeXt` Core Model
//!
//! [`ConvNextConfig`] describes the stage depths and widths;
//! [`ConvNextConfig::init`] builds a [`ConvNext`].

use crate::layers::norm::layer_norm_2d::{LayerNorm2d, LayerNorm2dConfig};
use crate::models::convnext::block::{ConvNextBlock, ConvNextBlockConfig};
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Config, Tensor};

/// ConvNeXt-Tiny stage depths.
pub const CONVNEXT_TINY_DEPTHS: [usize; 4] = [3, 3, 9, 3];

/// ConvNeXt-Tiny stage widths.
pub const CONVNEXT_TINY_DIMS: [usize; 4] = [96, 192, 384, 768];

/// [`ConvNext`] configuration.
#[derive(Config, Debug)]
pub struct ConvNextConfig {
    /// Number of classification classes.
    pub num_classes: usize,

    /// Blocks per stage.
    #[config(default = "CONVNEXT_TINY_DEPTHS")]
    pub depths: [usize; 4],

    /// Channel width per stage.
    #[config(default = "CONVNEXT_TINY_DIMS")]
    pub dims: [usize; 4],

    /// Initial value of the block layer scales.
    #[config(default = 1e-6)]
    pub layer_scale_init: f64,
}

impl ConvNextConfig {
    /// The `ConvNeXt-Tiny` layout.
    pub fn tiny(num_classes: usize) -> Self {
        Self::new(num_classes)
    }

    /// Initialize a [`ConvNext`] model.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNext<B> {
        let stages = (0..4)
            .map(|idx| {
                let dim = self.dims[idx];
                let downsample = if idx == 0 {
                    None
                } else {
                    Some(ConvNextDownsample {
                        norm: LayerNorm2dConfig::new(self.dims[idx - 1]).init(device),
                        conv: Conv2dConfig::new([self.dims[idx - 1], dim], [2, 2])
                            .with_stride([2, 2])
                            .init(device),
                    })
                };
                let block = ConvNextBlockConfig::new(dim).with_layer_scale_init(self.layer_scale_init);
                ConvNextStage {
                    downsample,
                    blocks: (0..self.depths[idx])
                        .map(|_| block.init(device))
                        .collect(),
                }
            })
            .collect();

        ConvNext {
            // 4x4 patchify, /4
            stem_conv: Conv2dConfig::new([3, self.dims[0]], [4, 4])
                .with_stride([4, 4])
                .init(device),
            stem_norm: LayerNorm2dConfig::new(self.dims[0]).init(device),
            stages,
            head_norm: LayerNormConfig::new(self.dims[3])
                .with_epsilon(1e-6)
                .init(device),
            head: LinearConfig::new(self.dims[3], self.num_classes).init(device),
        }
    }
}

/// Between-stage resolution reduction.
#[derive(Module, Debug)]
pub struct ConvNextDownsample<B: Backend> {
    /// Norm before the strided conv.
    pub norm: LayerNorm2d<B>,

    /// ``2x2`` stride-2 conv.
    pub conv: Conv2d<B>,
}

/// A stage: optional downsample then a run of blocks.
#[derive(Module, Debug)]
pub struct ConvNextStage<B: Backend> {
    /// Downsample (absent on the first stage).
    pub downsample: Option<ConvNextDownsample<B>>,

    /// Blocks.
    pub blocks: Vec<ConvNextBlock<B>>,
}

impl<B: Backend> ConvNextStage<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = match &self.downsample {
            Some(downsample) => downsample.conv.forward(downsample.norm.forward(input)),
            None => input,
        };
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

/// `ConvNeXt` model.
#[derive(Module, Debug)]
pub struct ConvNext<B: Backend> {
    /// Patchify conv.
    pub stem_conv: Conv2d<B>,

    /// Stem norm.
    pub stem_norm: LayerNorm2d<B>,

    /// Stages.
    pub stages: Vec<ConvNextStage<B>>,

    /// Norm over pooled features.
    pub head_norm: LayerNorm<B>,

    /// Head classifier.
    pub head: Linear<B>,
}

impl<B: Backend> ConvNext<B> {
    /// Output width of the classification layer.
    pub fn num_classes(&self) -> usize {
        let [_d_input, d_output] = self.head.weight.dims();
        d_output
    }

    /// `ConvNeXt` forward pass.
    ///
    /// Maps ``[batch, 3, height, width]`` images to ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.stem_norm.forward(self.stem_conv.forward(input));
        let x = self.stages.iter().fold(x, |x, stage| stage.forward(x));

        // Global average pool: [B, C, H, W] -> [B, C]
        let x = x.mean_dim(3).mean_dim(2).flatten::<2>(1, 3);
        let x = self.head_norm.forward(x);
        self.head.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_convnext_tiny_config() {
        let config = ConvNextConfig::tiny(11);
        assert_eq!(config.depths, CONVNEXT_TINY_DEPTHS);
        assert_eq!(config.dims, CONVNEXT_TINY_DIMS);
        assert_eq!(config.num_classes, 11);
    }

    #[test]
    fn test_convnext_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ConvNext<B> = ConvNextConfig::new(3)
            .with_depths([1, 1, 1, 1])
            .with_dims([4, 8, 8, 16])
            .init(&device);
        assert_eq!(model.num_classes(), 3);
        assert!(model.stages[0].downsample.is_none());
        assert!(model.stages[1].downsample.is_some());

        let output = model.forward(Tensor::ones([2, 3, 32, 32], &device));
        assert_eq!(output.dims(), [2, 3]);
    }
}
