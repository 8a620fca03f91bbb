//! # Checkpoints
//!
//! * [`container`] - layout classification and encoding.
//! * [`params`] - named parameter views of modules.
//! * [`prefix`] - wrapper prefix normalization.
//! * [`loader`] - loading into and saving from a network.

pub mod container;
pub mod loader;
pub mod params;
pub mod prefix;

pub use container::{CheckpointContainer, CheckpointLayout, CheckpointMetadata, StateKey};
pub use loader::{load_checkpoint_file, load_state, save_checkpoint};
