//! # Architecture Pre-Fabs
//!
//! A static table maps each [`Architecture`] to a builder for its structure
//! config. Dispatch from a tag to a network goes through this table only.

use crate::errors::Result;
use crate::models::architecture::Architecture;
use crate::models::classifier::CloudClassifier;
use crate::models::convnext::ConvNextConfig;
use crate::models::resnet::ResNetConfig;
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Structure config for any supported family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierConfig {
    /// Residual backbone.
    ResNet(ResNetConfig),

    /// Compact convolutional backbone.
    ConvNext(ConvNextConfig),
}

impl ClassifierConfig {
    /// Width of the classification layer.
    pub fn num_classes(&self) -> usize {
        match self {
            ClassifierConfig::ResNet(config) => config.num_classes,
            ClassifierConfig::ConvNext(config) => config.num_classes,
        }
    }

    /// Initialize a [`CloudClassifier`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CloudClassifier<B> {
        match self {
            ClassifierConfig::ResNet(config) => CloudClassifier::ResNet(config.init(device)),
            ClassifierConfig::ConvNext(config) => CloudClassifier::ConvNext(config.init(device)),
        }
    }
}

/// Static builder for a well-known [`ClassifierConfig`].
pub struct StaticArchitecturePreFab {
    /// The architecture built.
    pub architecture: Architecture,

    /// Description of the pre-fab.
    pub description: &'static str,

    /// Builder function; takes the class count.
    pub builder: fn(usize) -> ClassifierConfig,
}

impl StaticArchitecturePreFab {
    /// Build a new config.
    pub fn new_config(
        &self,
        num_classes: usize,
    ) -> ClassifierConfig {
        (self.builder)(num_classes)
    }
}

impl Debug for StaticArchitecturePreFab {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StaticArchitecturePreFab")
            .field("architecture", &self.architecture)
            .field("description", &self.description)
            .finish()
    }
}

fn resnet18_config(num_classes: usize) -> ClassifierConfig {
    ClassifierConfig::ResNet(ResNetConfig::resnet18(num_classes))
}

fn convnext_tiny_config(num_classes: usize) -> ClassifierConfig {
    ClassifierConfig::ConvNext(ConvNextConfig::tiny(num_classes))
}

/// `ResNet-18` pre-fab.
pub static RESNET18_PREFAB: StaticArchitecturePreFab = StaticArchitecturePreFab {
    architecture: Architecture::ResNet18,
    description: "ResNet-18, basic residual blocks [2, 2, 2, 2]",
    builder: resnet18_config,
};

/// `ConvNeXt-Tiny` pre-fab.
pub static CONVNEXT_TINY_PREFAB: StaticArchitecturePreFab = StaticArchitecturePreFab {
    architecture: Architecture::ConvNextTiny,
    description: "ConvNeXt-Tiny, depths [3, 3, 9, 3], dims [96, 192, 384, 768]",
    builder: convnext_tiny_config,
};

/// Every pre-fab, one per [`Architecture`].
pub static ARCHITECTURE_PREFABS: [&StaticArchitecturePreFab; 2] =
    [&RESNET18_PREFAB, &CONVNEXT_TINY_PREFAB];

/// Lookup the pre-fab for an architecture.
pub fn lookup_prefab(architecture: Architecture) -> &'static StaticArchitecturePreFab {
    match architecture {
        Architecture::ResNet18 => &RESNET18_PREFAB,
        Architecture::ConvNextTiny => &CONVNEXT_TINY_PREFAB,
    }
}

/// Build a freshly initialized classifier from an architecture tag.
///
/// The tag is validated before any network is constructed.
pub fn build_classifier<B: Backend>(
    tag: &str,
    num_classes: usize,
    device: &B::Device,
) -> Result<CloudClassifier<B>> {
    let architecture = Architecture::parse(tag)?;
    Ok(lookup_prefab(architecture)
        .new_config(num_classes)
        .init(device))
}
