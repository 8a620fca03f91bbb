//! # `ConvNeXt`
//!
//! The compact convolutional backbone family.

pub mod block;
pub mod convnext_model;

pub use convnext_model::{
    CONVNEXT_TINY_DEPTHS, CONVNEXT_TINY_DIMS, ConvNext, ConvNextConfig,
};
