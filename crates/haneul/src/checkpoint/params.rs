//! # Named Parameter Views of Modules
//!
//! A module's record, encoded by [`NamedMpkBytesRecorder`], is a MessagePack
//! tree. Every [`burn::module::Param`] appears in that tree as a map with
//! ``id`` and ``param`` entries; the tensor itself is a map with ``bytes``,
//! ``shape`` and ``dtype`` entries (a *tensor leaf*).
//!
//! [`module_params`] flattens that tree into a [`ParamMap`] keyed by dotted
//! names (``layers.0.blocks.1.conv_norm1.norm.gamma``), and [`apply_params`]
//! substitutes a [`ParamMap`] back into a module after an exact structural
//! comparison.

use crate::errors::{HaneulError, Result, ShapeMismatch, StateMismatch};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use rmpv::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Dotted parameter name to tensor leaf.
pub type ParamMap = BTreeMap<String, Value>;

type ModuleRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

const ITEM_KEY: &str = "item";
const PARAM_KEY: &str = "param";
const ID_KEY: &str = "id";
const TENSOR_KEYS: [&str; 3] = ["bytes", "shape", "dtype"];

fn map_get<'a>(
    entries: &'a [(Value, Value)],
    key: &str,
) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn map_get_mut<'a>(
    entries: &'a mut [(Value, Value)],
    key: &str,
) -> Option<&'a mut Value> {
    entries
        .iter_mut()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

/// Is this value an encoded tensor?
pub fn is_tensor_leaf(value: &Value) -> bool {
    match value {
        Value::Map(entries) => TENSOR_KEYS
            .iter()
            .all(|key| map_get(entries, key).is_some()),
        _ => false,
    }
}

/// The shape recorded in a tensor leaf.
pub fn leaf_shape(leaf: &Value) -> Vec<usize> {
    match leaf {
        Value::Map(entries) => map_get(entries, "shape")
            .and_then(Value::as_array)
            .map(|dims| {
                dims.iter()
                    .filter_map(Value::as_u64)
                    .map(|d| d as usize)
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Length of the raw data in a tensor leaf.
fn leaf_byte_len(leaf: &Value) -> Option<usize> {
    let Value::Map(entries) = leaf else {
        return None;
    };
    match map_get(entries, "bytes")? {
        Value::Binary(bytes) => Some(bytes.len()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn leaf_dtype(leaf: &Value) -> Option<&Value> {
    match leaf {
        Value::Map(entries) => map_get(entries, "dtype"),
        _ => None,
    }
}

fn is_param_wrapper(entries: &[(Value, Value)]) -> bool {
    map_get(entries, ID_KEY).is_some() && map_get(entries, PARAM_KEY).is_some()
}

fn join_path(
    prefix: &str,
    segment: &str,
) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn key_segment(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => s.as_str().map(str::to_string),
        Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Depth-first search for the first tensor leaf.
fn find_leaf(value: &Value) -> Option<&Value> {
    if is_tensor_leaf(value) {
        return Some(value);
    }
    match value {
        Value::Map(entries) => entries.iter().find_map(|(_, v)| find_leaf(v)),
        Value::Array(items) => items.iter().find_map(find_leaf),
        _ => None,
    }
}

fn find_leaf_mut(value: &mut Value) -> Option<&mut Value> {
    if is_tensor_leaf(value) {
        return Some(value);
    }
    match value {
        Value::Map(entries) => entries.iter_mut().find_map(|(_, v)| find_leaf_mut(v)),
        Value::Array(items) => items.iter_mut().find_map(find_leaf_mut),
        _ => None,
    }
}

/// Collect every parameter leaf under `value`.
fn collect_params(
    prefix: &str,
    value: &Value,
    out: &mut ParamMap,
) {
    match value {
        Value::Map(entries) if is_param_wrapper(entries) => {
            if let Some(leaf) = map_get(entries, PARAM_KEY).and_then(find_leaf) {
                out.insert(prefix.to_string(), leaf.clone());
            }
        }
        Value::Map(entries) => {
            for (key, child) in entries {
                if let Some(segment) = key_segment(key) {
                    collect_params(&join_path(prefix, &segment), child, out);
                }
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                collect_params(&join_path(prefix, &idx.to_string()), child, out);
            }
        }
        _ => {}
    }
}

/// Substitute leaves from `params` into the parameter wrappers under `value`.
///
/// Every visited name is recorded in `seen`; absent, mis-shaped and
/// malformed names go to `mismatch`.
fn substitute_params(
    prefix: &str,
    value: &mut Value,
    params: &ParamMap,
    seen: &mut BTreeSet<String>,
    mismatch: &mut StateMismatch,
) {
    match value {
        Value::Map(entries) if is_param_wrapper(entries) => {
            seen.insert(prefix.to_string());
            let Some(target) = map_get_mut(entries, PARAM_KEY).and_then(find_leaf_mut) else {
                return;
            };
            let Some(source) = params.get(prefix) else {
                mismatch.missing.push(prefix.to_string());
                return;
            };

            let expected = leaf_shape(target);
            let found = leaf_shape(source);
            if expected != found || leaf_dtype(target) != leaf_dtype(source) {
                mismatch.mismatched.push(ShapeMismatch {
                    name: prefix.to_string(),
                    expected,
                    found,
                });
                return;
            }
            if leaf_byte_len(target) != leaf_byte_len(source) {
                mismatch.malformed.push(prefix.to_string());
                return;
            }
            *target = source.clone();
        }
        Value::Map(entries) => {
            for (key, child) in entries.iter_mut() {
                if let Some(segment) = key_segment(key) {
                    substitute_params(&join_path(prefix, &segment), child, params, seen, mismatch);
                }
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter_mut().enumerate() {
                substitute_params(
                    &join_path(prefix, &idx.to_string()),
                    child,
                    params,
                    seen,
                    mismatch,
                );
            }
        }
        _ => {}
    }
}

fn encode_module<B: Backend, M: Module<B>>(module: &M) -> Result<Value> {
    let recorder = ModuleRecorder::default();
    let bytes =
        <ModuleRecorder as Recorder<B>>::record(&recorder, module.clone().into_record(), ())?;
    rmpv::decode::read_value(&mut bytes.as_slice()).map_err(|e| HaneulError::Encoding(e.to_string()))
}

fn record_item_mut(root: &mut Value) -> Result<&mut Value> {
    match root {
        Value::Map(entries) => map_get_mut(entries, ITEM_KEY),
        _ => None,
    }
    .ok_or_else(|| HaneulError::Encoding("module record has no item".to_string()))
}

/// Flatten a module into named tensor leaves.
pub fn module_params<B: Backend, M: Module<B>>(module: &M) -> Result<ParamMap> {
    let mut root = encode_module::<B, M>(module)?;
    let item = record_item_mut(&mut root)?;

    let mut params = ParamMap::new();
    collect_params("", item, &mut params);
    Ok(params)
}

/// Load named tensor leaves into a module.
///
/// Every module parameter must be present in `params` with the same shape,
/// dtype and data length, and `params` must carry no other names.
///
/// # Errors
///
/// [`HaneulError::StateMismatch`] listing every difference.
pub fn apply_params<B: Backend, M: Module<B>>(
    module: M,
    params: &ParamMap,
    device: &B::Device,
) -> Result<M> {
    let mut root = encode_module::<B, M>(&module)?;

    let mut seen = BTreeSet::new();
    let mut mismatch = StateMismatch::default();
    substitute_params("", record_item_mut(&mut root)?, params, &mut seen, &mut mismatch);

    mismatch.unexpected = params
        .keys()
        .filter(|name| !seen.contains(*name))
        .cloned()
        .collect();

    if !mismatch.is_empty() {
        return Err(HaneulError::StateMismatch(mismatch));
    }

    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &root)
        .map_err(|e| HaneulError::Encoding(e.to_string()))?;

    let recorder = ModuleRecorder::default();
    let record: M::Record = <ModuleRecorder as Recorder<B>>::load(&recorder, bytes, device)?;
    Ok(module.load_record(record))
}
