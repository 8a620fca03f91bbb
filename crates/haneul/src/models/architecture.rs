//! # Architecture Tags

use crate::errors::{HaneulError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of supported network families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// Residual backbone, `ResNet-18`.
    ResNet18,

    /// Compact convolutional backbone, `ConvNeXt-Tiny`.
    ConvNextTiny,
}

impl Architecture {
    /// Every supported architecture.
    pub const ALL: [Architecture; 2] = [Architecture::ResNet18, Architecture::ConvNextTiny];

    /// The canonical tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Architecture::ResNet18 => "resnet18",
            Architecture::ConvNextTiny => "convnext_tiny",
        }
    }

    /// Every tag accepted for this architecture, canonical first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Architecture::ResNet18 => &["resnet18", "resnet-18", "residual-backbone"],
            Architecture::ConvNextTiny => &[
                "convnext_tiny",
                "convnext-tiny",
                "convnexttiny",
                "compact-conv-backbone",
            ],
        }
    }

    /// Parse a tag, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`HaneulError::UnsupportedArchitecture`] for unknown tags.
    pub fn parse(tag: &str) -> Result<Self> {
        let needle = tag.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|arch| arch.aliases().contains(&needle.as_str()))
            .ok_or_else(|| HaneulError::UnsupportedArchitecture(tag.to_string()))
    }
}

impl FromStr for Architecture {
    type Err = HaneulError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Architecture {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        for arch in Architecture::ALL {
            for alias in arch.aliases() {
                assert_eq!(Architecture::parse(alias).unwrap(), arch);
                assert_eq!(
                    Architecture::parse(&alias.to_ascii_uppercase()).unwrap(),
                    arch
                );
            }
            assert_eq!(arch.to_string().parse::<Architecture>().unwrap(), arch);
        }
        assert_eq!(
            Architecture::parse("ConvNeXt-Tiny").unwrap(),
            Architecture::ConvNextTiny
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        match Architecture::parse("vgg16") {
            Err(HaneulError::UnsupportedArchitecture(tag)) => assert_eq!(tag, "vgg16"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(Architecture::parse("").is_err());
    }
}
