//! # Channels-First Layer Norm
//!
//! [`LayerNorm2d`] normalizes ``[batch, channels, height, width]`` tensors
//! over the channel dimension, by permuting channels last around a
//! [`LayerNorm`].

use burn::config::Config;
use burn::module::Module;
use burn::nn::{LayerNorm, LayerNormConfig};
use burn::prelude::{Backend, Tensor};

/// [`LayerNorm2d`] Config.
#[derive(Config, Debug)]
pub struct LayerNorm2dConfig {
    /// Number of channels.
    pub num_channels: usize,

    /// Numerical stability term.
    #[config(default = 1e-6)]
    pub epsilon: f64,
}

impl LayerNorm2dConfig {
    /// Initialize a [`LayerNorm2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> LayerNorm2d<B> {
        LayerNorm2d {
            norm: LayerNormConfig::new(self.num_channels)
                .with_epsilon(self.epsilon)
                .init(device),
        }
    }
}

/// Layer norm over the channel dimension of an image tensor.
#[derive(Module, Debug)]
pub struct LayerNorm2d<B: Backend> {
    /// Channels-last norm.
    pub norm: LayerNorm<B>,
}

impl<B: Backend> LayerNorm2d<B> {
    /// Forward Pass.
    ///
    /// Maps ``[batch, channels, height, width]`` to the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = input.permute([0, 2, 3, 1]);
        let x = self.norm.forward(x);
        x.permute([0, 3, 1, 2])
    }
}
