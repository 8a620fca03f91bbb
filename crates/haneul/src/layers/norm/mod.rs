//! # Normalization Layers
pub mod layer_norm_2d;
