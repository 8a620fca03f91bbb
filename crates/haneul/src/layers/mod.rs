//! Common low-level modules shared by the model families.
pub mod blocks;
pub mod norm;
