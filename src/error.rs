//! Typed errors and their stable codes.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing datasource: {0}")]
    MissingDataSource(String),
    #[error("duplicate datasource key: {0}")]
    DuplicateDataSource(String),
    #[error("invalid url for datasource '{key}': {url} (expected mysql:// or sqlite:)")]
    InvalidUrl { key: String, url: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transaction on datasource '{datasource}': {source}")]
    Transaction {
        datasource: String,
        source: sqlx::Error,
    },
    #[error("discovery on datasource '{datasource}': {source}")]
    Discovery {
        datasource: String,
        source: sqlx::Error,
    },
    #[error("query failed: {source}; sql: {sql}; params: {params:?}")]
    Query {
        sql: String,
        params: Vec<Value>,
        source: sqlx::Error,
    },
    #[error("stale record: {table} id {id} was changed by another writer")]
    StaleRecord { table: String, id: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("task: {0}")]
    Task(String),
}

impl AppError {
    /// Data-access failure with the statement and its bind values attached.
    pub fn query(sql: &str, params: &[Value], source: sqlx::Error) -> Self {
        AppError::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Transaction { .. } => "transaction_error",
            AppError::Discovery { .. } => "discovery_error",
            AppError::Query { source, .. } | AppError::Db(source) => {
                if let sqlx::Error::RowNotFound = source {
                    "not_found"
                } else {
                    "database_error"
                }
            }
            AppError::StaleRecord { .. } => "conflict",
            AppError::Task(_) => "task_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "not_found"
    }
}
