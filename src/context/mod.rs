//! Per-operation connection context: datasource pools, connection sets, transaction
//! brackets and the bounded worker pool.

mod connection_set;
mod datasource;
mod executor;
mod transaction;

pub use connection_set::ConnectionSet;
pub use datasource::{DataSource, DataSources};
pub use executor::{join_all, TaskPool};
pub use transaction::{spawn_transaction, with_connections, with_transaction};
