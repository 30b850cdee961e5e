//! dynamodel: schema-driven dynamic models, a filter-to-SQL compiler, a paginator and
//! multi-datasource transactions over MySQL and SQLite.

pub mod case;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod keys;
pub mod model;
pub mod paginator;
pub mod query;
pub mod response;
pub mod service;
pub mod sql;
pub mod state;
pub mod view;

pub use config::{load_from_env, load_from_file, validate, DataSourceConfig, Settings};
pub use context::{spawn_transaction, with_connections, with_transaction, ConnectionSet, DataSources, TaskPool};
pub use error::{AppError, ConfigError};
pub use model::{EntityType, ModelRegistry, Row};
pub use paginator::{PageResult, Paginator};
pub use query::{MatchMode, QueryField, QueryFilter, QueryOp};
pub use response::{Envelope, ErrorCode};
pub use service::CrudService;
pub use state::{init_tracing, AppState};
pub use view::ViewObject;
