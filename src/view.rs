//! Conversion between row maps and caller-defined view objects.

use crate::case::{object_keys_to_camel_case, to_column_name};
use crate::error::AppError;
use crate::model::EntityType;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Any serde type can stand in for a row. Fields are camelCase on the view side and
/// upper snake case columns on the row side.
pub trait ViewObject: Serialize + DeserializeOwned {
    /// Build the view from a row map. Row keys are camel-cased first; unknown keys are
    /// left to the view type's serde attributes.
    fn from_row(row: &Map<String, Value>) -> Result<Self, AppError> {
        let mut obj = row.clone();
        object_keys_to_camel_case(&mut obj);
        serde_json::from_value(Value::Object(obj))
            .map_err(|e| AppError::Validation(format!("row does not fit view: {}", e)))
    }

    /// Row attributes for `entity`: only fields naming a column transfer, nulls are dropped.
    fn to_row(&self, entity: &EntityType) -> Result<Map<String, Value>, AppError> {
        let value = serde_json::to_value(self)
            .map_err(|e| AppError::Validation(format!("view is not serializable: {}", e)))?;
        let Value::Object(fields) = value else {
            return Err(AppError::Validation("view must serialize to an object".into()));
        };
        Ok(fields
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .filter_map(|(k, v)| entity.column(&to_column_name(&k)).map(|c| (c.name.clone(), v)))
            .collect())
    }
}

impl<T: Serialize + DeserializeOwned> ViewObject for T {}
