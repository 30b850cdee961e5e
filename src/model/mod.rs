//! Runtime entity types synthesized from catalog metadata, and their row instances.

pub mod entity;
pub mod registry;
pub mod row;

pub use entity::{ColumnMeta, EntityType};
pub use registry::{Association, CountCache, ModelRegistry};
pub use row::Row;
