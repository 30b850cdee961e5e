//! Load settings from a JSON file or from the environment (after `.env`).

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::path::Path;

/// Read and validate settings from a JSON file.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let settings: Settings =
        serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    validate(&settings)?;
    Ok(settings)
}

/// Build settings from environment variables, loading `.env` first when present.
///
/// - `DATASOURCES`: `key=url,key=url`; falls back to `DATABASE_URL` as the `master` datasource
/// - `DEFAULT_DATASOURCE`, `WORKER_CONCURRENCY`, `BATCH_SIZE`, `AUDIT_USER`
/// - `CACHED_TABLES`: comma-separated table names
/// - `MAX_CONNECTIONS`: pool size applied to every datasource
pub fn load_from_env() -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();
    let max_connections = parse_env::<u32>("MAX_CONNECTIONS")?.unwrap_or(5);

    let datasources = match std::env::var("DATASOURCES") {
        Ok(raw) => parse_datasources(&raw, max_connections)?,
        Err(_) => match std::env::var("DATABASE_URL") {
            Ok(url) => vec![DataSourceConfig {
                key: MASTER.to_string(),
                url,
                max_connections,
            }],
            Err(_) => {
                return Err(ConfigError::Load(
                    "neither DATASOURCES nor DATABASE_URL is set".into(),
                ))
            }
        },
    };

    let mut settings = Settings::new(datasources);
    if let Ok(key) = std::env::var("DEFAULT_DATASOURCE") {
        settings.default_datasource = key;
    }
    if let Some(n) = parse_env::<usize>("WORKER_CONCURRENCY")? {
        settings.worker_concurrency = n;
    }
    if let Some(n) = parse_env::<usize>("BATCH_SIZE")? {
        settings.batch_size = n;
    }
    if let Ok(user) = std::env::var("AUDIT_USER") {
        settings.audit_user = user;
    }
    if let Ok(raw) = std::env::var("CACHED_TABLES") {
        settings.cached_tables = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    validate(&settings)?;
    Ok(settings)
}

/// Parse `key=url,key=url` into datasource entries, preserving order.
pub fn parse_datasources(raw: &str, max_connections: u32) -> Result<Vec<DataSourceConfig>, ConfigError> {
    let mut out = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, url) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::Load(format!("datasource entry '{}' is not key=url", entry)))?;
        out.push(DataSourceConfig {
            key: key.trim().to_string(),
            url: url.trim().to_string(),
            max_connections,
        });
    }
    Ok(out)
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Load(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
