//! # Conv/BatchNorm Block
//!
//! [`Conv2dNormBlock`] is a bias-free [`Conv2d`] followed by a [`BatchNorm`];
//! the unit every residual-backbone convolution is built from.
//!
//! Checkpoint names under a block are ``conv.weight``, ``norm.gamma``,
//! ``norm.beta``, ``norm.running_mean`` and ``norm.running_var``.

use bimm_contracts::{ShapeContract, shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::relu;

/// Channel and stride facts shared by [`Conv2dNormBlock`] and its config.
pub trait Conv2dNormBlockMeta {
    /// Input channels.
    fn in_channels(&self) -> usize;

    /// Output channels.
    fn out_channels(&self) -> usize;

    /// Spatial stride.
    fn stride(&self) -> usize;
}

/// [`Conv2dNormBlock`] configuration.
#[derive(Config, Debug)]
pub struct Conv2dNormBlockConfig {
    /// The inner convolution.
    pub conv: Conv2dConfig,
}

impl From<Conv2dConfig> for Conv2dNormBlockConfig {
    fn from(conv: Conv2dConfig) -> Self {
        Self { conv }
    }
}

impl Conv2dNormBlockConfig {
    /// A square ``kernel x kernel`` convolution padded by ``kernel / 2``.
    ///
    /// Output resolution is the input resolution divided by `stride`
    /// (rounded up).
    pub fn square(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
    ) -> Self {
        let pad = kernel / 2;
        Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(false)
            .into()
    }

    /// Initialize a [`Conv2dNormBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Conv2dNormBlock<B> {
        Conv2dNormBlock {
            conv: self.conv.init(device),
            norm: BatchNormConfig::new(self.out_channels()).init(device),
        }
    }
}

impl Conv2dNormBlockMeta for Conv2dNormBlockConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

/// Conv followed by batch norm.
#[derive(Module, Debug)]
pub struct Conv2dNormBlock<B: Backend> {
    /// Convolution.
    pub conv: Conv2d<B>,

    /// Batch norm over the conv output channels.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> Conv2dNormBlockMeta for Conv2dNormBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.dims()[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> Conv2dNormBlock<B> {
    /// Forward Pass.
    ///
    /// Maps ``[batch, in_channels, height, width]`` to
    /// ``[batch, out_channels, height / stride, width / stride]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        static INPUT_CONTRACT: ShapeContract =
            shape_contract!["batch", "in_channels", "height", "width"];
        INPUT_CONTRACT.assert_shape(&input, &[("in_channels", self.in_channels())]);

        self.norm.forward(self.conv.forward(input))
    }

    /// [`Self::forward`], then ReLU.
    pub fn forward_relu(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        relu(self.forward(input))
    }
}
