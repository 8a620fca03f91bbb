//! # Parameter Name Prefixes
//!
//! Checkpoints written from a data-parallel wrapper carry a ``module.``
//! prefix, and those written from a training wrapper carry ``model.``.
//! Each prefix is stripped only when detected on at least one name.

use crate::checkpoint::params::ParamMap;

/// Data-parallel wrapper prefix.
pub const DATA_PARALLEL_PREFIX: &str = "module.";

/// Training wrapper prefix.
pub const WRAPPER_PREFIX: &str = "model.";

/// Strip `prefix` from every name carrying it, if any name does.
///
/// Names without the prefix are kept as-is.
pub fn strip_prefix(
    params: ParamMap,
    prefix: &str,
) -> ParamMap {
    if !params.keys().any(|name| name.starts_with(prefix)) {
        return params;
    }
    tracing::debug!(prefix, "stripping parameter name prefix");
    params
        .into_iter()
        .map(|(name, leaf)| match name.strip_prefix(prefix) {
            Some(rest) => (rest.to_string(), leaf),
            None => (name, leaf),
        })
        .collect()
}

/// Strip ``module.`` then ``model.``.
pub fn normalize_param_names(params: ParamMap) -> ParamMap {
    strip_prefix(strip_prefix(params, DATA_PARALLEL_PREFIX), WRAPPER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;

    fn names(params: &ParamMap) -> Vec<&str> {
        params.keys().map(String::as_str).collect()
    }

    fn param_map(names: &[&str]) -> ParamMap {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), Value::from(idx as u64)))
            .collect()
    }

    #[test]
    fn test_strip_nested_prefixes() {
        let params = param_map(&["module.model.head.weight", "module.model.stem.conv.weight"]);
        let params = normalize_param_names(params);
        assert_eq!(names(&params), vec!["head.weight", "stem.conv.weight"]);
        assert_eq!(params["head.weight"], Value::from(0u64));
    }

    #[test]
    fn test_strip_is_detected_not_assumed() {
        let params = param_map(&["head.weight", "models.0.weight"]);
        assert_eq!(normalize_param_names(params.clone()), params);

        let params = param_map(&["model.head.weight", "stem.weight"]);
        assert_eq!(
            names(&normalize_param_names(params)),
            vec!["head.weight", "stem.weight"]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            vec!["module.head.weight", "module.stem.weight"],
            vec!["model.head.weight"],
            vec!["module.model.head.weight"],
            vec!["head.weight"],
        ] {
            let once = normalize_param_names(param_map(&raw));
            let twice = normalize_param_names(once.clone());
            assert_eq!(once, twice);
        }
    }
}
