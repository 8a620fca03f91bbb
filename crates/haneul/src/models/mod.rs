//! # Network Families
//!
//! * [`resnet`] - residual backbone.
//! * [`convnext`] - compact convolutional backbone.
//!
//! [`Architecture`] is the closed tag set; [`build_classifier`] dispatches
//! through the [`prefabs`] table.

pub mod architecture;
pub mod classifier;
pub mod convnext;
pub mod prefabs;
pub mod resnet;

pub use architecture::Architecture;
pub use classifier::CloudClassifier;
pub use prefabs::{ClassifierConfig, build_classifier};
