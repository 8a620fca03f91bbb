#![warn(missing_docs)]
//!# haneul - Cloud-Formation Classifier
//!
//! ## Notable Components
//!
//! * [`cache`] - checkpoint resolution and the on-disk artifact cache.
//! * [`models`] - the supported network families.
//!   * [`models::Architecture`] - the closed set of architecture tags.
//!   * [`models::resnet`] - the residual backbone (`ResNet-18`).
//!   * [`models::convnext`] - the compact convolutional backbone (`ConvNeXt-Tiny`).
//! * [`checkpoint`] - checkpoint containers and the state loader.
//! * [`preprocess`] - image decode and the deterministic input transform.
//! * [`predict`] - softmax, top-k decoding and confidence heuristics.
//! * [`catalog`] - display names, descriptions and tips per cloud code.
//! * [`bundle`] - the immutable, load-once [`bundle::ModelBundle`].

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod bundle;
pub mod cache;
pub mod catalog;
pub mod checkpoint;
pub mod errors;
pub mod layers;
pub mod models;
pub mod predict;
pub mod preprocess;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{HaneulError, Result};
