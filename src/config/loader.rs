//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables, then validate it
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, `__` between sections)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            debug!("Loading configuration file {}", path);
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // e.g. APP__COMPLETENESS__MAX_AGE_SECS=600
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    // DATABASE_URL is the conventional sqlx variable
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder
            .set_override("database.url", url)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
    }

    let config: AppConfig = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Parse configuration from a TOML string (used by tests and embedded defaults)
pub fn load_from_str(toml: &str) -> Result<AppConfig> {
    let config: AppConfig = Config::builder()
        .add_source(File::from_str(toml, config::FileFormat::Toml))
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Source;

    #[test]
    fn test_load_from_toml_string() {
        let config = load_from_str(
            r#"
            [completeness]
            required_sources = ["signal"]
            optional_sources = ["regime"]
            max_age_secs = 600

            [thresholds]
            execute = 80.0
            wait = 65.0
            "#,
        )
        .unwrap();

        assert_eq!(config.completeness.optional_sources, vec![Source::Regime]);
        assert_eq!(config.completeness.max_age_secs, 600);
        assert_eq!(config.thresholds.execute, 80.0);
        assert_eq!(config.gates.max_spread_bps, 15.0);
    }

    #[test]
    fn test_invalid_toml_config_rejected_at_load() {
        let result = load_from_str(
            r#"
            [completeness]
            required_sources = ["alignment"]
            "#,
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/confluence.toml")).unwrap();
        assert_eq!(config.thresholds.wait, 60.0);
    }
}
