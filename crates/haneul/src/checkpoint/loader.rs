//! # State Loader
//!
//! Moves checkpoint parameters into a constructed [`CloudClassifier`].

use crate::checkpoint::container::{CheckpointContainer, CheckpointLayout, CheckpointMetadata};
use crate::checkpoint::prefix::normalize_param_names;
use crate::errors::Result;
use crate::models::CloudClassifier;
use burn::prelude::Backend;
use std::path::Path;

/// Load a decoded checkpoint into `network`.
///
/// Parameter names are normalized (``module.`` then ``model.`` stripped when
/// present) and must match the network exactly.
///
/// # Returns
///
/// The loaded network and the checkpoint metadata.
pub fn load_state<B: Backend>(
    network: CloudClassifier<B>,
    container: CheckpointContainer,
    device: &B::Device,
) -> Result<(CloudClassifier<B>, CheckpointMetadata)> {
    let params = normalize_param_names(container.params);
    tracing::debug!(
        layout = ?container.layout,
        params = params.len(),
        "loading checkpoint state"
    );
    let network = network.load_params(&params, device)?;
    Ok((network, container.metadata))
}

/// Read a checkpoint file and load it into `network`.
pub fn load_checkpoint_file<B: Backend>(
    network: CloudClassifier<B>,
    path: &Path,
    device: &B::Device,
) -> Result<(CloudClassifier<B>, CheckpointMetadata)> {
    load_state(network, CheckpointContainer::read(path)?, device)
}

/// Write `network` as a checkpoint in `layout`.
///
/// `metadata` is written only by the keyed layouts.
pub fn save_checkpoint<B: Backend>(
    network: &CloudClassifier<B>,
    metadata: &CheckpointMetadata,
    layout: CheckpointLayout,
    path: &Path,
) -> Result<()> {
    let metadata = match layout {
        CheckpointLayout::Keyed(_) => metadata.clone(),
        _ => CheckpointMetadata::default(),
    };
    let container = CheckpointContainer {
        layout,
        params: network.params()?,
        metadata,
    };
    container.write(path)?;
    tracing::debug!(path = %path.display(), ?layout, "checkpoint written");
    Ok(())
}
