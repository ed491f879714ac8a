// src/config.rs

//! Configuration loading utilities.
//!
//! Configuration comes from a TOML file (local path, or an object in S3 for
//! the Lambda binary), then environment overrides are applied on top.

use std::path::Path;

#[cfg(feature = "s3")]
use serde::de::DeserializeOwned;

#[cfg(feature = "s3")]
use crate::storage::S3Store;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Config loader for Lambda environment.
#[cfg(feature = "s3")]
pub struct LambdaConfigLoader {
    storage: S3Store,
    prefix: String,
}

#[cfg(feature = "s3")]
impl LambdaConfigLoader {
    pub fn new(storage: S3Store, config_prefix: &str) -> Self {
        Self {
            storage,
            prefix: config_prefix.trim_matches('/').to_string(),
        }
    }

    async fn load_toml<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let key = if self.prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.prefix, file_name)
        };
        log::info!("Loading config file from S3: {}", key);
        let bytes = self
            .storage
            .read_bytes_optional(&key)
            .await?
            .ok_or_else(|| AppError::config(format!("Config file not found in S3: {key}")))?;

        let s = String::from_utf8(bytes)
            .map_err(|e| AppError::config(format!("Config file {key} is not valid UTF-8: {e}")))?;
        toml::from_str(&s).map_err(AppError::from)
    }

    /// Load `config.toml` and apply environment overrides. Not validated.
    pub async fn load_config(&self) -> Result<Config> {
        let mut config: Config = self.load_toml("config.toml").await?;
        config.apply_env();
        Ok(config)
    }
}

/// Load configuration from a TOML file, apply environment overrides and
/// validate the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = load_unvalidated(path)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn load_unvalidated(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(AppError::config(format!(
            "Config file not found at {}",
            path.display()
        )));
    }
    Config::load(path).map_err(|e| match e {
        AppError::Toml(e) => AppError::config(format!("{}: {e}", path.display())),
        other => other,
    })
}
