//! Named connection pools, one per configured datasource.

use crate::config::Settings;
use crate::error::{AppError, ConfigError};
use crate::sql::Dialect;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

#[derive(Clone, Debug)]
pub struct DataSource {
    pub key: String,
    pub dialect: Dialect,
    pub pool: AnyPool,
}

/// Every configured datasource in declaration order, plus the default key.
#[derive(Clone, Debug)]
pub struct DataSources {
    sources: Vec<DataSource>,
    default_key: String,
}

impl DataSources {
    /// Open a pool per datasource. Fails on the first datasource that cannot connect.
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();
        let mut sources = Vec::with_capacity(settings.datasources.len());
        for ds in &settings.datasources {
            let dialect = Dialect::from_url(&ds.url).ok_or_else(|| ConfigError::InvalidUrl {
                key: ds.key.clone(),
                url: ds.url.clone(),
            })?;
            let pool = AnyPoolOptions::new()
                .max_connections(ds.max_connections)
                .connect(&ds.url)
                .await?;
            tracing::info!(datasource = %ds.key, dialect = %dialect, "datasource connected");
            sources.push(DataSource {
                key: ds.key.clone(),
                dialect,
                pool,
            });
        }
        Ok(DataSources::from_sources(sources, &settings.default_datasource))
    }

    /// Wrap pools that are already open.
    pub fn from_sources(sources: Vec<DataSource>, default_key: &str) -> Self {
        DataSources {
            sources,
            default_key: default_key.to_string(),
        }
    }

    /// Datasource by key. An unknown key fails naming the key and the available ones.
    pub fn get(&self, key: &str) -> Result<&DataSource, AppError> {
        self.sources.iter().find(|s| s.key == key).ok_or_else(|| {
            AppError::Validation(format!(
                "datasource '{}' does not exist; available: [{}]",
                key,
                self.keys().join(", ")
            ))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sources.iter().any(|s| s.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.key.clone()).collect()
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    pub async fn close(&self) {
        for s in &self.sources {
            s.pool.close().await;
        }
    }
}
