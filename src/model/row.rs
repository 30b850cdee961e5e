//! Row instance: a case-insensitive attribute bag bound to one entity type.

use crate::error::AppError;
use crate::model::EntityType;
use crate::sql::is_blank;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Row {
    entity: Arc<EntityType>,
    /// Keyed by canonical (upper-case) column name.
    attrs: Map<String, Value>,
    new: bool,
    dirty: BTreeSet<String>,
}

impl Row {
    /// Empty, unsaved row.
    pub fn new(entity: Arc<EntityType>) -> Self {
        Row {
            entity,
            attrs: Map::new(),
            new: true,
            dirty: BTreeSet::new(),
        }
    }

    /// Row from a caller's map. Keys naming no column are dropped. The row is new when
    /// the id is absent or blank.
    pub fn from_map(entity: Arc<EntityType>, map: &Map<String, Value>) -> Self {
        let mut row = Row::new(entity);
        for (k, v) in map {
            if let Some(c) = row.entity.column(k) {
                let name = c.name.clone();
                row.dirty.insert(name.clone());
                row.attrs.insert(name, v.clone());
            }
        }
        row.new = row.id().map(is_blank).unwrap_or(true);
        row
    }

    /// Row read back from the database: persisted and clean.
    pub fn loaded(entity: Arc<EntityType>, map: &Map<String, Value>) -> Self {
        let mut row = Row::from_map(entity, map);
        row.new = false;
        row.dirty.clear();
        row
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let c = self.entity.column(column)?;
        self.attrs.get(&c.name)
    }

    /// Set an attribute. Fails when `column` is not a column of the entity.
    pub fn set(&mut self, column: &str, value: Value) -> Result<&mut Self, AppError> {
        let name = self
            .entity
            .column(column)
            .map(|c| c.name.clone())
            .ok_or_else(|| {
                AppError::Validation(format!("{} has no column '{}'", self.entity.table, column))
            })?;
        self.dirty.insert(name.clone());
        self.attrs.insert(name, value);
        Ok(self)
    }

    pub fn id(&self) -> Option<&Value> {
        self.attrs.get(&self.entity.id_column)
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_columns(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Attributes keyed by canonical column name.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Changed attributes only, keyed by canonical column name.
    pub fn changes(&self) -> Map<String, Value> {
        self.dirty
            .iter()
            .filter_map(|k| self.attrs.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Record a successful write: the row is persisted and clean, with `id` assigned when given.
    pub fn mark_saved(&mut self, id: Option<Value>) {
        if let Some(id) = id {
            self.attrs.insert(self.entity.id_column.clone(), id);
        }
        self.new = false;
        self.dirty.clear();
    }

    /// Lower-case keys in column order, present attributes only.
    pub fn to_map(&self) -> Map<String, Value> {
        self.entity
            .columns
            .iter()
            .filter_map(|c| self.attrs.get(&c.name).map(|v| (c.name.to_lowercase(), v.clone())))
            .collect()
    }
}
