// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, WatcherConfig};
use crate::errors::{Result, WatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.watcher,
            raw.source,
            raw.artifacts,
            raw.dispatcher,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watcher_config(&cfg.watcher)?;
    validate_url("[source].base_url", &cfg.source.base_url)?;
    ensure_non_empty("[source].table", &cfg.source.table)?;
    ensure_non_empty("[artifacts].bucket", &cfg.artifacts.bucket)?;
    validate_url("[dispatcher].url", &cfg.dispatcher.url)?;
    ensure_non_empty(
        "[dispatcher].fetch_document_workflow",
        &cfg.dispatcher.fetch_document_workflow,
    )?;
    ensure_non_empty(
        "[dispatcher].extract_code_workflow",
        &cfg.dispatcher.extract_code_workflow,
    )?;
    Ok(())
}

/// Check the scheduling limits on their own.
///
/// Used directly when a watcher is built in code without a config file.
pub fn validate_watcher_config(cfg: &WatcherConfig) -> Result<()> {
    if cfg.max_concurrent == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.poll_interval_ms == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.retention_ms == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].retention_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.dispatch_timeout_ms == Some(0) {
        return Err(WatchError::ConfigError(
            "[watcher].dispatch_timeout_ms must be >= 1 when set".to_string(),
        ));
    }
    if cfg.artifact_extension.trim().trim_start_matches('.').is_empty() {
        return Err(WatchError::ConfigError(
            "[watcher].artifact_extension must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WatchError::ConfigError(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    ensure_non_empty(field, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(WatchError::ConfigError(format!(
            "{field} must start with http:// or https:// (got '{value}')"
        )));
    }
    Ok(())
}
