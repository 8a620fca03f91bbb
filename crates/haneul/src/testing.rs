//! Shared test fixtures.

use crate::models::CloudClassifier;
use crate::models::convnext::ConvNextConfig;
use crate::models::resnet::ResNetConfig;
use burn::prelude::Backend;

/// A narrow one-block-per-layer residual network.
pub fn tiny_resnet<B: Backend>(
    num_classes: usize,
    device: &B::Device,
) -> CloudClassifier<B> {
    CloudClassifier::ResNet(
        ResNetConfig::new([1, 1, 1, 1], num_classes)
            .with_stem_width(4)
            .init(device),
    )
}

/// A narrow one-block-per-stage `ConvNeXt`.
pub fn tiny_convnext<B: Backend>(
    num_classes: usize,
    device: &B::Device,
) -> CloudClassifier<B> {
    CloudClassifier::ConvNext(
        ConvNextConfig::new(num_classes)
            .with_depths([1, 1, 1, 1])
            .with_dims([4, 8, 8, 16])
            .init(device),
    )
}
