//! # Checkpoint Containers
//!
//! A checkpoint is a MessagePack document in one of three layouts:
//!
//! * a map holding the parameters under a state key ([`StateKey`]), beside
//!   optional metadata (``classes``, ``img_size``, ``arch``, ``run_name``, ...);
//! * a bare map of parameter name to tensor;
//! * a bare sequence of ``[name, tensor]`` pairs.
//!
//! The layout is classified once, before any field is read.

use crate::cache::disk::write_atomic;
use crate::checkpoint::params::{ParamMap, is_tensor_leaf};
use crate::errors::{HaneulError, Result};
use rmpv::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Keys under which a keyed checkpoint stores its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// ``model_state``
    ModelState,

    /// ``state_dict``
    StateDict,

    /// ``model_state_dict``
    ModelStateDict,
}

impl StateKey {
    /// Every state key, in lookup priority order.
    pub const PRIORITY: [StateKey; 3] = [
        StateKey::ModelState,
        StateKey::StateDict,
        StateKey::ModelStateDict,
    ];

    /// The map key.
    pub fn key(&self) -> &'static str {
        match self {
            StateKey::ModelState => "model_state",
            StateKey::StateDict => "state_dict",
            StateKey::ModelStateDict => "model_state_dict",
        }
    }
}

/// The container layout of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointLayout {
    /// Parameters under a state key, beside metadata.
    Keyed(StateKey),

    /// The whole document is the parameter map.
    BareMap,

    /// The whole document is a sequence of ``[name, tensor]`` pairs.
    BareSequence,
}

impl Default for CheckpointLayout {
    fn default() -> Self {
        CheckpointLayout::Keyed(StateKey::ModelState)
    }
}

/// Non-parameter entries of a keyed checkpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// Class names, in output order.
    pub classes: Option<Vec<String>>,

    /// Training image size.
    pub image_size: Option<usize>,

    /// Architecture tag.
    pub architecture: Option<String>,

    /// Training run name.
    pub run_name: Option<String>,

    /// Every other entry, as written.
    pub extra: BTreeMap<String, Value>,
}

const CLASSES_KEY: &str = "classes";
const IMAGE_SIZE_KEY: &str = "img_size";
const ARCH_KEY: &str = "arch";
const RUN_NAME_KEY: &str = "run_name";

fn malformed(
    key: &str,
    expected: &str,
) -> HaneulError {
    HaneulError::UnrecognizedCheckpoint(format!("metadata `{key}` is not {expected}"))
}

fn expect_string(
    key: &str,
    value: Value,
) -> Result<String> {
    match value {
        Value::String(s) => s.into_str().ok_or_else(|| malformed(key, "valid UTF-8")),
        _ => Err(malformed(key, "a string")),
    }
}

impl CheckpointMetadata {
    /// Build from the non-parameter entries of a keyed checkpoint.
    pub fn from_entries(entries: Vec<(String, Value)>) -> Result<Self> {
        let mut meta = CheckpointMetadata::default();
        for (key, value) in entries {
            match key.as_str() {
                CLASSES_KEY => {
                    let Value::Array(items) = value else {
                        return Err(malformed(CLASSES_KEY, "a list of strings"));
                    };
                    meta.classes = Some(
                        items
                            .into_iter()
                            .map(|item| expect_string(CLASSES_KEY, item))
                            .collect::<Result<_>>()?,
                    );
                }
                IMAGE_SIZE_KEY => {
                    let size = value
                        .as_u64()
                        .filter(|&s| s > 0)
                        .ok_or_else(|| malformed(IMAGE_SIZE_KEY, "a positive integer"))?;
                    meta.image_size = Some(size as usize);
                }
                ARCH_KEY => meta.architecture = Some(expect_string(ARCH_KEY, value)?),
                RUN_NAME_KEY => meta.run_name = Some(expect_string(RUN_NAME_KEY, value)?),
                _ => {
                    meta.extra.insert(key, value);
                }
            }
        }
        Ok(meta)
    }

    /// Encode as map entries.
    pub fn to_entries(&self) -> Vec<(Value, Value)> {
        let mut entries = Vec::new();
        if let Some(classes) = &self.classes {
            entries.push((
                Value::from(CLASSES_KEY),
                Value::Array(classes.iter().map(|c| Value::from(c.as_str())).collect()),
            ));
        }
        if let Some(size) = self.image_size {
            entries.push((Value::from(IMAGE_SIZE_KEY), Value::from(size as u64)));
        }
        if let Some(arch) = &self.architecture {
            entries.push((Value::from(ARCH_KEY), Value::from(arch.as_str())));
        }
        if let Some(run_name) = &self.run_name {
            entries.push((Value::from(RUN_NAME_KEY), Value::from(run_name.as_str())));
        }
        for (key, value) in &self.extra {
            entries.push((Value::from(key.as_str()), value.clone()));
        }
        entries
    }

    /// No metadata present.
    pub fn is_empty(&self) -> bool {
        self == &CheckpointMetadata::default()
    }
}

/// A decoded checkpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointContainer {
    /// The layout read or to be written.
    pub layout: CheckpointLayout,

    /// Parameters, as stored (prefixes not yet stripped).
    pub params: ParamMap,

    /// Metadata; always empty for the bare layouts.
    pub metadata: CheckpointMetadata,
}

fn string_key(key: &Value) -> Option<&str> {
    key.as_str()
}

/// Read a map whose values are all tensors.
fn as_param_map(entries: &[(Value, Value)]) -> Option<ParamMap> {
    entries
        .iter()
        .map(|(key, value)| {
            if is_tensor_leaf(value) {
                string_key(key).map(|name| (name.to_string(), value.clone()))
            } else {
                None
            }
        })
        .collect()
}

/// Read a sequence of ``[name, tensor]`` pairs.
fn as_param_pairs(items: &[Value]) -> Option<ParamMap> {
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([name, leaf]) if is_tensor_leaf(leaf) => {
                name.as_str().map(|name| (name.to_string(), leaf.clone()))
            }
            _ => None,
        })
        .collect()
}

impl CheckpointContainer {
    /// Classify and decode a checkpoint document.
    ///
    /// # Errors
    ///
    /// [`HaneulError::UnrecognizedCheckpoint`] when no layout matches.
    pub fn decode(document: Value) -> Result<Self> {
        match document {
            Value::Map(entries) => {
                let state_key = StateKey::PRIORITY.into_iter().find(|state_key| {
                    entries
                        .iter()
                        .any(|(k, _)| string_key(k) == Some(state_key.key()))
                });

                match state_key {
                    Some(state_key) => Self::decode_keyed(state_key, entries),
                    None => as_param_map(&entries)
                        .map(|params| CheckpointContainer {
                            layout: CheckpointLayout::BareMap,
                            params,
                            metadata: CheckpointMetadata::default(),
                        })
                        .ok_or_else(|| {
                            HaneulError::UnrecognizedCheckpoint(
                                "map has no state key and is not a parameter map".to_string(),
                            )
                        }),
                }
            }
            Value::Array(items) => as_param_pairs(&items)
                .map(|params| CheckpointContainer {
                    layout: CheckpointLayout::BareSequence,
                    params,
                    metadata: CheckpointMetadata::default(),
                })
                .ok_or_else(|| {
                    HaneulError::UnrecognizedCheckpoint(
                        "sequence is not a list of [name, tensor] pairs".to_string(),
                    )
                }),
            other => Err(HaneulError::UnrecognizedCheckpoint(format!(
                "top level is neither a map nor a sequence: {other}"
            ))),
        }
    }

    fn decode_keyed(
        state_key: StateKey,
        entries: Vec<(Value, Value)>,
    ) -> Result<Self> {
        let mut params = None;
        let mut rest = Vec::new();
        for (key, value) in entries {
            let Some(name) = string_key(&key).map(str::to_string) else {
                return Err(HaneulError::UnrecognizedCheckpoint(format!(
                    "non-string top-level key: {key}"
                )));
            };
            if name == state_key.key() {
                params = match &value {
                    Value::Map(state) => as_param_map(state),
                    _ => None,
                };
                if params.is_none() {
                    return Err(HaneulError::UnrecognizedCheckpoint(format!(
                        "`{name}` is not a parameter map"
                    )));
                }
            } else {
                rest.push((name, value));
            }
        }

        Ok(CheckpointContainer {
            layout: CheckpointLayout::Keyed(state_key),
            params: params.unwrap_or_default(),
            metadata: CheckpointMetadata::from_entries(rest)?,
        })
    }

    /// Encode in ``self.layout``.
    ///
    /// Metadata is only representable in the keyed layouts; it is dropped
    /// otherwise.
    pub fn encode(&self) -> Value {
        match self.layout {
            CheckpointLayout::Keyed(state_key) => {
                let state = self
                    .params
                    .iter()
                    .map(|(name, leaf)| (Value::from(name.as_str()), leaf.clone()))
                    .collect();
                let mut entries = vec![(Value::from(state_key.key()), Value::Map(state))];
                entries.extend(self.metadata.to_entries());
                Value::Map(entries)
            }
            CheckpointLayout::BareMap => Value::Map(
                self.params
                    .iter()
                    .map(|(name, leaf)| (Value::from(name.as_str()), leaf.clone()))
                    .collect(),
            ),
            CheckpointLayout::BareSequence => Value::Array(
                self.params
                    .iter()
                    .map(|(name, leaf)| Value::Array(vec![Value::from(name.as_str()), leaf.clone()]))
                    .collect(),
            ),
        }
    }

    /// Decode from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document = rmpv::decode::read_value(&mut &bytes[..]).map_err(|e| {
            HaneulError::UnrecognizedCheckpoint(format!("not a MessagePack document: {e}"))
        })?;
        Self::decode(document)
    }

    /// Encode to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &self.encode())
            .map_err(|e| HaneulError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    /// Read a checkpoint file.
    pub fn read(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Write a checkpoint file atomically.
    pub fn write(
        &self,
        path: &Path,
    ) -> Result<()> {
        if !matches!(self.layout, CheckpointLayout::Keyed(_)) && !self.metadata.is_empty() {
            tracing::warn!(layout = ?self.layout, "bare checkpoint layouts drop metadata");
        }
        write_atomic(path, &self.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(shape: &[u64]) -> Value {
        Value::Map(vec![
            (Value::from("bytes"), Value::Binary(vec![0; 4])),
            (
                Value::from("shape"),
                Value::Array(shape.iter().map(|&d| Value::from(d)).collect()),
            ),
            (Value::from("dtype"), Value::from("F32")),
        ])
    }

    fn state() -> Vec<(Value, Value)> {
        vec![
            (Value::from("head.weight"), leaf(&[1])),
            (Value::from("head.bias"), leaf(&[1])),
        ]
    }

    #[test]
    fn test_keyed_priority() {
        let document = Value::Map(vec![
            (Value::from("state_dict"), Value::Map(vec![])),
            (Value::from("model_state"), Value::Map(state())),
            (Value::from("classes"), Value::Array(vec![Value::from("Cu")])),
        ]);
        let container = CheckpointContainer::decode(document).unwrap();
        assert_eq!(container.layout, CheckpointLayout::Keyed(StateKey::ModelState));
        assert_eq!(container.params.len(), 2);
        assert_eq!(container.metadata.classes, Some(vec!["Cu".to_string()]));
        assert!(container.metadata.extra.contains_key("state_dict"));
    }

    #[test]
    fn test_metadata_fields() {
        let document = Value::Map(vec![
            (Value::from("model_state_dict"), Value::Map(state())),
            (Value::from("img_size"), Value::from(256u64)),
            (Value::from("arch"), Value::from("convnext_tiny")),
            (Value::from("run_name"), Value::from("run-7")),
            (Value::from("epoch"), Value::from(12u64)),
        ]);
        let container = CheckpointContainer::decode(document).unwrap();
        assert_eq!(
            container.layout,
            CheckpointLayout::Keyed(StateKey::ModelStateDict)
        );
        let meta = &container.metadata;
        assert_eq!(meta.image_size, Some(256));
        assert_eq!(meta.architecture.as_deref(), Some("convnext_tiny"));
        assert_eq!(meta.run_name.as_deref(), Some("run-7"));
        assert_eq!(meta.extra["epoch"], Value::from(12u64));

        assert_eq!(CheckpointContainer::decode(container.encode()).unwrap(), container);
    }

    #[test]
    fn test_bare_layouts() {
        let container = CheckpointContainer::decode(Value::Map(state())).unwrap();
        assert_eq!(container.layout, CheckpointLayout::BareMap);
        assert!(container.metadata.is_empty());

        let pairs = Value::Array(
            state()
                .into_iter()
                .map(|(k, v)| Value::Array(vec![k, v]))
                .collect(),
        );
        let sequence = CheckpointContainer::decode(pairs).unwrap();
        assert_eq!(sequence.layout, CheckpointLayout::BareSequence);
        assert_eq!(sequence.params, container.params);
    }

    #[test]
    fn test_unrecognized_layouts() {
        for document in [
            Value::from(3u64),
            Value::Map(vec![(Value::from("epoch"), Value::from(3u64))]),
            Value::Map(vec![(Value::from("model_state"), Value::from("weights"))]),
            Value::Array(vec![Value::Array(vec![Value::from("head.weight")])]),
        ] {
            assert!(matches!(
                CheckpointContainer::decode(document),
                Err(HaneulError::UnrecognizedCheckpoint(_))
            ));
        }

        assert!(matches!(
            CheckpointContainer::from_bytes(&[]),
            Err(HaneulError::UnrecognizedCheckpoint(_))
        ));
    }

    #[test]
    fn test_malformed_metadata() {
        let document = Value::Map(vec![
            (Value::from("model_state"), Value::Map(state())),
            (Value::from("classes"), Value::from("Cu")),
        ]);
        assert!(matches!(
            CheckpointContainer::decode(document),
            Err(HaneulError::UnrecognizedCheckpoint(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.mpk");

        let container = CheckpointContainer {
            layout: CheckpointLayout::Keyed(StateKey::StateDict),
            params: CheckpointContainer::decode(Value::Map(state())).unwrap().params,
            metadata: CheckpointMetadata {
                run_name: Some("r".to_string()),
                ..Default::default()
            },
        };
        container.write(&path).unwrap();
        assert_eq!(CheckpointContainer::read(&path).unwrap(), container);
    }
}
