//! Config document loading.
//!
//! 1. Read the file (size-capped)
//! 2. Parse TOML into a value tree
//! 3. Apply `TIDINGS_*` env var fallbacks for fields the document left unset
//! 4. Deserialize into [`TidingsConfig`]
//! 5. Validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::TidingsConfig;
use crate::validate;

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Load a config file, applying env var fallbacks from the process
/// environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, if an env
/// var fallback is malformed, or if the result fails validation.
pub fn load_file(path: &Path) -> ConfigResult<TidingsConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len(),
            ),
        });
    }

    let config = parse(&content, &path.display().to_string(), &collect_env_vars())?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Parse a config document without consulting the environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document cannot be parsed or fails
/// validation.
pub fn from_toml_str(content: &str) -> ConfigResult<TidingsConfig> {
    parse(content, "<inline>", &HashMap::new())
}

/// Parse a config document with an explicit set of env vars used as
/// fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document cannot be parsed, an env var
/// fallback is malformed, or the result fails validation.
pub fn from_toml_str_with_env<S: ::std::hash::BuildHasher>(
    content: &str,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<TidingsConfig> {
    parse(content, "<inline>", env_vars)
}

fn parse<S: ::std::hash::BuildHasher>(
    content: &str,
    origin: &str,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<TidingsConfig> {
    let mut tree: toml::Value = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })?;

    let applied = apply_env_fallbacks(&mut tree, env_vars)?;
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let config: TidingsConfig =
        tree.try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: origin.to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MainThreadPolicy;
    use std::io::Write;

    #[test]
    fn test_load_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bus]\nmain_thread = \"manual\"\nio_max_threads = 8\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = load_file(file.path()).unwrap();
        assert_eq!(config.bus.main_thread, MainThreadPolicy::Manual);
        assert_eq!(config.bus.io_max_threads, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_malformed_document() {
        let err = from_toml_str("[bus\nio_max_threads = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == "<inline>"));
    }

    #[test]
    fn test_wrong_field_type() {
        let err = from_toml_str("[bus]\nio_max_threads = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let err = from_toml_str("[bus]\ncomputation_threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_env_fallback_is_validated() {
        let env: HashMap<String, String> =
            [("TIDINGS_MAIN_THREAD".to_owned(), "manual".to_owned())].into();
        let config = from_toml_str_with_env("", &env).unwrap();
        assert_eq!(config.bus.main_thread, MainThreadPolicy::Manual);

        let bad: HashMap<String, String> =
            [("TIDINGS_LOG_LEVEL".to_owned(), "chatty".to_owned())].into();
        assert!(from_toml_str_with_env("", &bad).is_err());
    }
}
