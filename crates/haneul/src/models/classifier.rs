//! # Cloud Classifier Network
//!
//! [`CloudClassifier`] is a tagged union over the supported families.
//! Parameter names are those of the wrapped network, without a variant
//! prefix, so checkpoints written by either family load directly.

use crate::checkpoint::params::{ParamMap, apply_params, module_params};
use crate::errors::Result;
use crate::models::architecture::Architecture;
use crate::models::convnext::ConvNext;
use crate::models::resnet::ResNet;
use burn::prelude::{Backend, Tensor};

/// A constructed classification network.
#[derive(Debug, Clone)]
pub enum CloudClassifier<B: Backend> {
    /// Residual backbone.
    ResNet(ResNet<B>),

    /// Compact convolutional backbone.
    ConvNext(ConvNext<B>),
}

impl<B: Backend> CloudClassifier<B> {
    /// The family of the wrapped network.
    pub fn architecture(&self) -> Architecture {
        match self {
            CloudClassifier::ResNet(_) => Architecture::ResNet18,
            CloudClassifier::ConvNext(_) => Architecture::ConvNextTiny,
        }
    }

    /// Output width of the classification layer.
    pub fn num_classes(&self) -> usize {
        match self {
            CloudClassifier::ResNet(model) => model.num_classes(),
            CloudClassifier::ConvNext(model) => model.num_classes(),
        }
    }

    /// Maps ``[batch, 3, height, width]`` images to ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self {
            CloudClassifier::ResNet(model) => model.forward(input),
            CloudClassifier::ConvNext(model) => model.forward(input),
        }
    }

    /// Named tensor leaves of every parameter.
    pub fn params(&self) -> Result<ParamMap> {
        match self {
            CloudClassifier::ResNet(model) => module_params::<B, _>(model),
            CloudClassifier::ConvNext(model) => module_params::<B, _>(model),
        }
    }

    /// Replace every parameter, requiring an exact structural match.
    pub fn load_params(
        self,
        params: &ParamMap,
        device: &B::Device,
    ) -> Result<Self> {
        Ok(match self {
            CloudClassifier::ResNet(model) => {
                CloudClassifier::ResNet(apply_params::<B, _>(model, params, device)?)
            }
            CloudClassifier::ConvNext(model) => {
                CloudClassifier::ConvNext(apply_params::<B, _>(model, params, device)?)
            }
        })
    }
}
