//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the core `ResNet-18` convolution unit:
//! two ``3x3`` conv/norm layers around a residual connection.

use crate::layers::blocks::conv_norm::{
    Conv2dNormBlock, Conv2dNormBlockConfig, Conv2dNormBlockMeta,
};
use crate::models::resnet::downsample::{ConvDownsample, ConvDownsampleConfig};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// [`BasicBlock`] Config.
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub stride: usize,
}

impl BasicBlockConfig {
    /// Does this block need a projection on the residual path?
    pub fn needs_downsample(&self) -> bool {
        self.stride != 1 || self.in_planes != self.out_planes
    }

    /// Initialize a [`BasicBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        let downsample = if self.needs_downsample() {
            Some(
                ConvDownsampleConfig::new(self.in_planes, self.out_planes)
                    .with_stride(self.stride)
                    .init(device),
            )
        } else {
            None
        };

        BasicBlock {
            conv_norm1: Conv2dNormBlockConfig::square(
                self.in_planes,
                self.out_planes,
                3,
                self.stride,
            )
            .init(device),
            conv_norm2: Conv2dNormBlockConfig::square(self.out_planes, self.out_planes, 3, 1)
                .init(device),
            downsample,
        }
    }
}

/// Basic Block for `ResNet`.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// First Conv/Norm Block.
    pub conv_norm1: Conv2dNormBlock<B>,

    /// Second Conv/Norm Block.
    pub conv_norm2: Conv2dNormBlock<B>,

    /// Optional `DownSample` layer; for the residual connection.
    pub downsample: Option<ConvDownsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    /// The size of the in channels dimension.
    pub fn in_planes(&self) -> usize {
        self.conv_norm1.in_channels()
    }

    /// The size of the out channels dimension.
    pub fn out_planes(&self) -> usize {
        self.conv_norm2.out_channels()
    }

    /// The stride of the block.
    pub fn stride(&self) -> usize {
        self.conv_norm1.stride()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, in_height / stride, in_width / stride]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv_norm1.forward_relu(input);
        let x = self.conv_norm2.forward(x);

        relu(x + identity)
    }
}
