//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they are only applied to fields
//! that the config document did not set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Kind of value an env var is coerced into.
#[derive(Clone, Copy)]
enum ValueKind {
    String,
    Integer,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

/// All supported `TIDINGS_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TIDINGS_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "TIDINGS_LOG_FORMAT",
        field_path: "logging.format",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "TIDINGS_MAIN_THREAD",
        field_path: "bus.main_thread",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "TIDINGS_COMPUTATION_THREADS",
        field_path: "bus.computation_threads",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "TIDINGS_IO_MAX_THREADS",
        field_path: "bus.io_max_threads",
        kind: ValueKind::Integer,
    },
];

/// Apply environment variable fallbacks to fields that are absent from
/// `root`.
///
/// Returns the number of env vars applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] when a numeric variable does not parse.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    root: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        if field_is_set(root, mapping.field_path) {
            continue;
        }

        let value = match mapping.kind {
            ValueKind::String => toml::Value::String(raw.clone()),
            ValueKind::Integer => {
                let parsed = raw.trim().parse::<i64>().map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?;
                toml::Value::Integer(parsed)
            },
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(root, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Collect the `TIDINGS_*` environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("TIDINGS_"))
        .collect()
}

fn field_is_set(root: &toml::Value, path: &str) -> bool {
    let mut current = root;
    for segment in path.split('.') {
        match current.as_table().and_then(|t| t.get(segment)) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        if let Some(table) = root.as_table_mut() {
            table.insert(path.to_owned(), value);
        }
        return;
    };

    let mut current = root;
    for segment in parents.split('.') {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_missing_fields() {
        let mut root: toml::Value = toml::from_str("").unwrap();
        let env = make_env(&[
            ("TIDINGS_LOG_LEVEL", "debug"),
            ("TIDINGS_COMPUTATION_THREADS", "3"),
        ]);

        let applied = apply_env_fallbacks(&mut root, &env).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(root["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(root["bus"]["computation_threads"].as_integer(), Some(3));
    }

    #[test]
    fn test_fallback_does_not_override_document() {
        let mut root: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        let env = make_env(&[("TIDINGS_LOG_LEVEL", "trace")]);

        let applied = apply_env_fallbacks(&mut root, &env).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(root["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_fallback_rejects_non_numeric_thread_count() {
        let mut root: toml::Value = toml::from_str("").unwrap();
        let env = make_env(&[("TIDINGS_IO_MAX_THREADS", "lots")]);

        let err = apply_env_fallbacks(&mut root, &env).unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { ref var_name, .. } if var_name == "TIDINGS_IO_MAX_THREADS"));
    }
}
