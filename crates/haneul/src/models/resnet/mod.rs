//! # `ResNet`
//!
//! The residual backbone family.

pub mod basic_block;
pub mod downsample;
pub mod layer_block;
pub mod resnet_model;

pub use resnet_model::{RESNET18_BLOCKS, ResNet, ResNetConfig};
