//! # Error Taxonomy
//!
//! Load-time variants ([`HaneulError::Configuration`],
//! [`HaneulError::UnsupportedArchitecture`], [`HaneulError::StateMismatch`],
//! [`HaneulError::ClassCountMismatch`], [`HaneulError::UnrecognizedCheckpoint`])
//! are fatal at startup. [`HaneulError::Decode`], [`HaneulError::UnsupportedImage`]
//! and [`HaneulError::Inference`] are per-request failures.

use std::fmt;
use thiserror::Error;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, HaneulError>;

/// Errors raised by the classifier pipeline.
#[derive(Debug, Error)]
pub enum HaneulError {
    /// A required setting is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The architecture tag is not one of the supported families.
    #[error("unsupported architecture: {0:?}")]
    UnsupportedArchitecture(String),

    /// The checkpoint parameters do not match the network structure.
    #[error("checkpoint does not match network: {0}")]
    StateMismatch(StateMismatch),

    /// The class list length differs from the network output width.
    #[error("class list has {classes} entries but the network has {outputs} outputs")]
    ClassCountMismatch {
        /// Number of class names.
        classes: usize,
        /// Output width of the classification layer.
        outputs: usize,
    },

    /// The checkpoint container is not one of the known layouts.
    #[error("unrecognized checkpoint layout: {0}")]
    UnrecognizedCheckpoint(String),

    /// The input image could not be decoded.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The image decoded but its geometry is outside what the transform accepts.
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// A remote artifact could not be fetched.
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// The artifact URL.
        url: String,
        /// Failure description.
        reason: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Container or record (de)serialization failure.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The forward pass or its decoding failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl HaneulError {
    /// Is this a per-request failure caused by the caller's input?
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HaneulError::Decode(_) | HaneulError::UnsupportedImage(_)
        )
    }
}

impl From<burn::record::RecorderError> for HaneulError {
    fn from(err: burn::record::RecorderError) -> Self {
        HaneulError::Encoding(format!("{err:?}"))
    }
}

/// Structural differences between a checkpoint and a network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMismatch {
    /// Network parameters absent from the checkpoint.
    pub missing: Vec<String>,

    /// Checkpoint parameters the network does not have.
    pub unexpected: Vec<String>,

    /// Parameters present on both sides with differing shape or dtype.
    pub mismatched: Vec<ShapeMismatch>,

    /// Parameters whose data length disagrees with their shape and dtype.
    pub malformed: Vec<String>,
}

impl StateMismatch {
    /// No differences found.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.mismatched.is_empty()
            && self.malformed.is_empty()
    }
}

impl fmt::Display for StateMismatch {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {:?}", self.missing));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected {:?}", self.unexpected));
        }
        if !self.mismatched.is_empty() {
            let shapes = self
                .mismatched
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>();
            parts.push(format!("mismatched [{}]", shapes.join(", ")));
        }
        if !self.malformed.is_empty() {
            parts.push(format!("malformed data {:?}", self.malformed));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// A single parameter whose layout differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// Parameter name.
    pub name: String,
    /// Shape the network expects.
    pub expected: Vec<usize>,
    /// Shape found in the checkpoint.
    pub found: Vec<usize>,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}: expected {:?}, found {:?}",
            self.name, self.expected, self.found
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_display() {
        let mismatch = StateMismatch {
            missing: vec!["head.weight".to_string()],
            unexpected: vec![],
            mismatched: vec![ShapeMismatch {
                name: "stem.weight".to_string(),
                expected: vec![8, 3, 3, 3],
                found: vec![4, 3, 3, 3],
            }],
            malformed: vec![],
        };
        assert!(!mismatch.is_empty());
        assert_eq!(
            mismatch.to_string(),
            "missing [\"head.weight\"]; mismatched [stem.weight: expected [8, 3, 3, 3], found [4, 3, 3, 3]]"
        );
    }

    #[test]
    fn test_client_errors() {
        let err = HaneulError::Inference("boom".to_string());
        assert!(!err.is_client_error());

        let err: HaneulError = image::load_from_memory(b"not an image")
            .unwrap_err()
            .into();
        assert!(err.is_client_error());

        let err = HaneulError::UnsupportedImage("aspect ratio 500".to_string());
        assert!(err.is_client_error());
    }
}
