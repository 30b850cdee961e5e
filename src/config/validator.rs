//! Settings validation: datasource keys, urls and defaults.

use crate::config::Settings;
use crate::error::ConfigError;
use crate::sql::Dialect;
use regex::Regex;
use std::collections::HashSet;

const KEY_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_\-]*$";

pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.datasources.is_empty() {
        return Err(ConfigError::Validation("at least one datasource required".into()));
    }
    let key_re = Regex::new(KEY_PATTERN)
        .map_err(|e| ConfigError::Validation(format!("invalid datasource key pattern: {}", e)))?;
    let mut keys = HashSet::new();
    for ds in &settings.datasources {
        if !key_re.is_match(&ds.key) {
            return Err(ConfigError::Validation(format!(
                "datasource key '{}' must start with a letter and hold only letters, digits, '_' or '-'",
                ds.key
            )));
        }
        if !keys.insert(ds.key.as_str()) {
            return Err(ConfigError::DuplicateDataSource(ds.key.clone()));
        }
        if Dialect::from_url(&ds.url).is_none() {
            return Err(ConfigError::InvalidUrl {
                key: ds.key.clone(),
                url: ds.url.clone(),
            });
        }
        if ds.max_connections == 0 {
            return Err(ConfigError::Validation(format!(
                "datasource '{}': max_connections must be at least 1",
                ds.key
            )));
        }
    }
    if !keys.contains(settings.default_datasource.as_str()) {
        return Err(ConfigError::MissingDataSource(settings.default_datasource.clone()));
    }
    if settings.worker_concurrency == 0 {
        return Err(ConfigError::Validation("worker_concurrency must be at least 1".into()));
    }
    if settings.batch_size == 0 {
        return Err(ConfigError::Validation("batch_size must be at least 1".into()));
    }
    for child in &settings.children {
        if child.parent.is_empty() || child.child.is_empty() || child.foreign_key.is_empty() {
            return Err(ConfigError::Validation(format!(
                "child association {} -> {} needs parent, child and foreign_key",
                child.parent, child.child
            )));
        }
    }
    Ok(())
}
