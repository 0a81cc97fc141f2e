//! Post-parse configuration validation.
//!
//! Validates that deserialized [`TidingsConfig`](crate::TidingsConfig)
//! values are within acceptable ranges.

use crate::error::{ConfigError, ConfigResult};
use crate::types::TidingsConfig;

/// Upper bound for any configured thread count.
const MAX_THREADS: usize = 4096;

/// Validate a deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &TidingsConfig) -> ConfigResult<()> {
    validate_bus(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_bus(config: &TidingsConfig) -> ConfigResult<()> {
    let bus = &config.bus;

    if let Some(threads) = bus.computation_threads {
        check_thread_count("bus.computation_threads", threads)?;
    }
    check_thread_count("bus.io_max_threads", bus.io_max_threads)?;

    if bus.thread_name_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "bus.thread_name_prefix".to_owned(),
            message: "thread name prefix must not be empty".to_owned(),
        });
    }

    Ok(())
}

fn check_thread_count(field: &str, threads: usize) -> ConfigResult<()> {
    if threads == 0 || threads > MAX_THREADS {
        return Err(ConfigError::ValidationError {
            field: field.to_owned(),
            message: format!("{threads} is out of range; must be between 1 and {MAX_THREADS}"),
        });
    }
    Ok(())
}

fn validate_logging(config: &TidingsConfig) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&TidingsConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_computation_threads_rejected() {
        let mut config = TidingsConfig::default();
        config.bus.computation_threads = Some(0);
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "bus.computation_threads"
        );
    }

    #[test]
    fn test_io_threads_upper_bound() {
        let mut config = TidingsConfig::default();
        config.bus.io_max_threads = MAX_THREADS + 1;
        assert_eq!(field_of(validate(&config).unwrap_err()), "bus.io_max_threads");
    }

    #[test]
    fn test_blank_thread_prefix_rejected() {
        let mut config = TidingsConfig::default();
        config.bus.thread_name_prefix = "  ".to_owned();
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "bus.thread_name_prefix"
        );
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = TidingsConfig::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.level");
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = TidingsConfig::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.format");
    }
}
