//! # Checkpoint Resolution and Cache

pub mod disk;
pub mod resolver;

pub use resolver::{ArtifactFetcher, HubFetcher, ResolverConfig, resolve_checkpoint};
