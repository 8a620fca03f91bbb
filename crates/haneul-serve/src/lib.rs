#![warn(missing_docs)]
//!# haneul-serve - HTTP Boundary
//!
//! Serves a loaded [`haneul::bundle::ModelBundle`] over HTTP.
//!
//! * ``GET /`` - liveness message.
//! * ``GET /health`` - model facts.
//! * ``POST /predict`` - multipart upload, field ``file``; returns a
//!   [`haneul::predict::PredictionReport`].
//!
//! See [`args::ServeArgs`] for the environment the binary reads.

pub mod args;
pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{AppState, RouterOptions, build_router};
