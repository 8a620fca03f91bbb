//! # `ConvNeXt` Block
//!
//! ``depthwise 7x7 conv -> layer norm -> 4x MLP (GELU) -> layer scale``,
//! wrapped in a residual connection.

use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Config, Tensor};
use burn::tensor::activation::gelu;

/// [`ConvNextBlock`] Config.
#[derive(Config, Debug)]
pub struct ConvNextBlockConfig {
    /// Channel width.
    pub dim: usize,

    /// Hidden width multiplier of the MLP.
    #[config(default = 4)]
    pub mlp_ratio: usize,

    /// Initial value of the per-channel layer scale.
    #[config(default = 1e-6)]
    pub layer_scale_init: f64,
}

impl ConvNextBlockConfig {
    /// Initialize a [`ConvNextBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNextBlock<B> {
        let hidden = self.dim * self.mlp_ratio;
        ConvNextBlock {
            dwconv: Conv2dConfig::new([self.dim, self.dim], [7, 7])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_groups(self.dim)
                .init(device),
            norm: LayerNormConfig::new(self.dim)
                .with_epsilon(1e-6)
                .init(device),
            pwconv1: LinearConfig::new(self.dim, hidden).init(device),
            pwconv2: LinearConfig::new(hidden, self.dim).init(device),
            gamma: Param::from_tensor(Tensor::full([self.dim], self.layer_scale_init, device)),
        }
    }
}

/// `ConvNeXt` block.
#[derive(Module, Debug)]
pub struct ConvNextBlock<B: Backend> {
    /// Depthwise spatial convolution.
    pub dwconv: Conv2d<B>,

    /// Channels-last norm.
    pub norm: LayerNorm<B>,

    /// Pointwise expansion.
    pub pwconv1: Linear<B>,

    /// Pointwise projection.
    pub pwconv2: Linear<B>,

    /// Per-channel layer scale.
    pub gamma: Param<Tensor<B, 1>>,
}

impl<B: Backend> ConvNextBlock<B> {
    /// Channel width.
    pub fn dim(&self) -> usize {
        self.gamma.dims()[0]
    }

    /// Forward Pass.
    ///
    /// Maps ``[batch, dim, height, width]`` to the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.dwconv.forward(input.clone());

        // [B, C, H, W] -> [B, H, W, C]
        let x = x.permute([0, 2, 3, 1]);
        let x = self.norm.forward(x);
        let x = gelu(self.pwconv1.forward(x));
        let x = self.pwconv2.forward(x);
        let x = x * self.gamma.val().unsqueeze::<4>();
        let x = x.permute([0, 3, 1, 2]);

        input + x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_convnext_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ConvNextBlock<B> = ConvNextBlockConfig::new(8).init(&device);
        assert_eq!(block.dim(), 8);
        assert_eq!(block.pwconv1.weight.dims(), [8, 32]);

        let output = block.forward(Tensor::ones([2, 8, 6, 6], &device));
        assert_eq!(output.dims(), [2, 8, 6, 6]);
    }

    #[test]
    fn test_convnext_block_zero_scale_is_identity() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ConvNextBlock<B> = ConvNextBlockConfig::new(4)
            .with_layer_scale_init(0.0)
            .init(&device);

        let input: Tensor<B, 4> = Tensor::random(
            [1, 4, 5, 5],
            burn::tensor::Distribution::Default,
            &device,
        );
        let output = block.forward(input.clone());

        let diff = (output - input)
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);
    }
}
