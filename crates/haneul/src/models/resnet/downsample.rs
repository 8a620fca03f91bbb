//! # Residual Projection
//!
//! [`ConvDownsample`] projects the skip path of a [`super::basic_block::BasicBlock`]
//! when the block changes resolution or width: a ``1x1`` strided conv/norm.

use crate::layers::blocks::conv_norm::{
    Conv2dNormBlock, Conv2dNormBlockConfig, Conv2dNormBlockMeta,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ConvDownsample`] configuration.
#[derive(Config, Debug)]
pub struct ConvDownsampleConfig {
    /// Skip path input width.
    pub in_channels: usize,

    /// Skip path output width.
    pub out_channels: usize,

    /// Spatial stride.
    #[config(default = 1)]
    pub stride: usize,
}

impl ConvDownsampleConfig {
    /// Initialize a [`ConvDownsample`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvDownsample<B> {
        ConvDownsample {
            conv_norm: Conv2dNormBlockConfig::square(
                self.in_channels,
                self.out_channels,
                1,
                self.stride,
            )
            .init(device),
        }
    }
}

/// Skip path projection.
#[derive(Module, Debug)]
pub struct ConvDownsample<B: Backend> {
    /// ``1x1`` conv/norm.
    pub conv_norm: Conv2dNormBlock<B>,
}

impl<B: Backend> ConvDownsample<B> {
    /// Projected width.
    pub fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    /// Project ``[batch, in, h, w]`` to ``[batch, out, h / stride, w / stride]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv_norm.forward(input)
    }
}
