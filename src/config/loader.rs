//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP__, `__` separated)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("strategy.universe")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let app: AppConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    validate(&app)?;
    Ok(app)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    load_config(None)
}

/// Reject settings the engine cannot run with
pub fn validate(config: &AppConfig) -> Result<()> {
    let indicator = &config.indicator;
    if indicator.fast_period == 0 || indicator.slow_period == 0 || indicator.signal_period == 0 {
        return Err(EngineError::Configuration(
            "indicator periods must be positive".to_string(),
        ));
    }
    if indicator.fast_period >= indicator.slow_period {
        return Err(EngineError::Configuration(format!(
            "fast period {} must be shorter than slow period {}",
            indicator.fast_period, indicator.slow_period
        )));
    }
    if config.strategy.lot_size == 0 {
        return Err(EngineError::Configuration("lot_size must be positive".to_string()));
    }
    if config.strategy.volume_unit.is_sign_negative() || config.strategy.volume_unit.is_zero() {
        return Err(EngineError::Configuration("volume_unit must be positive".to_string()));
    }
    if config.orders.sweep_interval_seconds == 0 {
        return Err(EngineError::Configuration(
            "sweep_interval_seconds must be positive".to_string(),
        ));
    }
    Ok(())
}
