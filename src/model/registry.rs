//! Process-wide model registry: table name to entity type, child associations, the shared
//! count cache and suspended optimistic-lock columns.

use crate::catalog::{self, TableInfo};
use crate::config::Settings;
use crate::context::DataSources;
use crate::error::AppError;
use crate::keys;
use crate::model::{ColumnMeta, EntityType};
use crate::sql::Dialect;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A child table whose `foreign_key` column points at the parent's id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
    pub child: String,
    pub foreign_key: String,
}

#[derive(Default)]
struct RegistryState {
    entities: HashMap<String, Arc<EntityType>>,
    children: HashMap<String, Vec<Association>>,
    initialized: HashSet<String>,
    /// Version columns removed by `close_lock`, keyed by table.
    suspended: HashMap<String, ColumnMeta>,
}

impl RegistryState {
    /// Put-if-absent.
    fn insert(&mut self, entity: EntityType) -> Arc<EntityType> {
        let key = entity.key();
        self.entities
            .entry(key)
            .or_insert_with(|| Arc::new(entity))
            .clone()
    }

    fn add_child(&mut self, parent: &str, child: &str, foreign_key: &str) {
        let assoc = Association {
            child: child.to_lowercase(),
            foreign_key: foreign_key.to_uppercase(),
        };
        let list = self.children.entry(parent.to_lowercase()).or_default();
        if !list.contains(&assoc) {
            list.push(assoc);
        }
    }

    /// Register every single-key table of one datasource, then its foreign keys.
    fn populate(&mut self, datasource: &str, dialect: Dialect, tables: Vec<TableInfo>, settings: &Settings) -> usize {
        let mut registered = 0;
        let mut links = Vec::new();
        for table in tables {
            let [id_column] = table.primary_keys.as_slice() else {
                tracing::debug!(
                    datasource = %datasource,
                    table = %table.name,
                    keys = table.primary_keys.len(),
                    "skipping table without a single-column primary key"
                );
                continue;
            };
            let key = table.name.to_lowercase();
            if self.entities.contains_key(&key) {
                tracing::debug!(datasource = %datasource, table = %table.name, "table already registered");
                continue;
            }
            let mut entity = EntityType::new(&table.name, id_column, datasource, dialect, table.columns);
            entity.cached = settings.is_cached(&table.name);
            self.insert(entity);
            registered += 1;
            for fk in table.foreign_keys {
                links.push((fk.parent_table, key.clone(), fk.column));
            }
        }
        for (parent, child, column) in links {
            if self.entities.contains_key(&parent.to_lowercase()) {
                self.add_child(&parent, &child, &column);
            }
        }
        registered
    }

    fn apply_settings(&mut self, settings: &Settings) {
        for c in &settings.children {
            self.add_child(&c.parent, &c.child, &c.foreign_key);
        }
    }
}

/// Page counts for cached entity types, keyed by table, count SQL and params.
#[derive(Default)]
pub struct CountCache {
    counts: Mutex<HashMap<(String, String, String), u64>>,
}

impl CountCache {
    fn key(table: &str, sql: &str, params: &[Value]) -> (String, String, String) {
        (
            table.to_lowercase(),
            sql.to_string(),
            Value::Array(params.to_vec()).to_string(),
        )
    }

    pub fn get(&self, table: &str, sql: &str, params: &[Value]) -> Option<u64> {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(&Self::key(table, sql, params)).copied()
    }

    pub fn put(&self, table: &str, sql: &str, params: &[Value], count: u64) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.insert(Self::key(table, sql, params), count);
    }

    /// Drop every count of `table`. Called after writes to it.
    pub fn purge(&self, table: &str) {
        let table = table.to_lowercase();
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.retain(|(t, _, _), _| *t != table);
    }

    pub fn clear(&self) {
        self.counts.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.counts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
    counts: CountCache,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a table from known column metadata. A table already registered is
    /// returned unchanged.
    pub fn register_table(
        &self,
        table: &str,
        id_column: &str,
        datasource: &str,
        dialect: Dialect,
        columns: Vec<ColumnMeta>,
    ) -> Arc<EntityType> {
        self.register(EntityType::new(table, id_column, datasource, dialect, columns))
    }

    /// Put-if-absent registration of a built entity type.
    pub fn register(&self, entity: EntityType) -> Arc<EntityType> {
        self.write().insert(entity)
    }

    /// Discover and register the tables of one datasource, reading columns from its catalog.
    pub async fn compile(&self, sources: &DataSources, datasource: &str, settings: &Settings) -> Result<usize, AppError> {
        let source = sources.get(datasource)?;
        let tables = catalog::scan(source).await?;
        let mut state = self.write();
        let n = state.populate(&source.key, source.dialect, tables, settings);
        state.apply_settings(settings);
        state.initialized.insert(source.key.clone());
        Ok(n)
    }

    /// Discover every datasource not yet initialized. A datasource whose catalog cannot be
    /// read is logged and skipped; the others still register.
    pub async fn init(&self, sources: &DataSources, settings: &Settings) -> usize {
        let mut total = 0;
        for key in sources.keys() {
            if self.is_initialized(&key) {
                continue;
            }
            match self.compile(sources, &key, settings).await {
                Ok(n) => {
                    tracing::info!(datasource = %key, tables = n, "models registered");
                    total += n;
                }
                Err(e) => tracing::error!(datasource = %key, error = %e, "model discovery failed"),
            }
        }
        total
    }

    /// Rebuild from scratch: rescans every datasource, then swaps the new models in and
    /// clears the count cache. Callers must hold off query traffic while this runs.
    pub async fn refresh(&self, sources: &DataSources, settings: &Settings) -> usize {
        let mut fresh = RegistryState::default();
        let mut total = 0;
        for source in sources.iter() {
            match catalog::scan(source).await {
                Ok(tables) => {
                    total += fresh.populate(&source.key, source.dialect, tables, settings);
                    fresh.initialized.insert(source.key.clone());
                }
                Err(e) => tracing::error!(datasource = %source.key, error = %e, "model discovery failed"),
            }
        }
        fresh.apply_settings(settings);
        *self.write() = fresh;
        self.counts.clear();
        tracing::info!(tables = total, "models refreshed");
        total
    }

    /// Entity type for a table name (any case).
    pub fn lookup(&self, table: &str) -> Result<Arc<EntityType>, AppError> {
        self.read().entities.get(&table.to_lowercase()).cloned().ok_or_else(|| {
            AppError::NotFound(format!(
                "table '{}' does not exist or no model has been created",
                table
            ))
        })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.read().entities.contains_key(&table.to_lowercase())
    }

    /// All registered entity types, ordered by table name.
    pub fn entities(&self) -> Vec<Arc<EntityType>> {
        let mut all: Vec<_> = self.read().entities.values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }

    pub fn declare_children(&self, parent: &str, child: &str, foreign_key: &str) {
        self.write().add_child(parent, child, foreign_key);
    }

    pub fn children_of(&self, parent: &str) -> Vec<Association> {
        self.read()
            .children
            .get(&parent.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_initialized(&self, datasource: &str) -> bool {
        self.read().initialized.contains(datasource)
    }

    pub fn counts(&self) -> &CountCache {
        &self.counts
    }

    /// Route a table's page counts through the count cache.
    pub fn set_cached(&self, table: &str, cached: bool) -> Result<(), AppError> {
        self.replace_entity(table, |e| {
            let mut copy = e.clone();
            copy.cached = cached;
            copy
        })?;
        Ok(())
    }

    /// Drop the version column from a table's metadata so writes skip version checks.
    /// Stays in effect until `reopen_lock`.
    pub fn close_lock(&self, table: &str) -> Result<(), AppError> {
        let mut state = self.write();
        let key = table.to_lowercase();
        let entity = state
            .entities
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("table '{}' does not exist or no model has been created", table)))?;
        let Some(column) = entity.column(keys::RECORD_VERSION).cloned() else {
            return Ok(());
        };
        state.suspended.insert(key.clone(), column);
        state.entities.insert(key, Arc::new(entity.without_column(keys::RECORD_VERSION)));
        tracing::info!(table = %table, "optimistic lock closed");
        Ok(())
    }

    /// Restore a version column removed by `close_lock`. Returns the entity type in effect.
    pub fn reopen_lock(&self, table: &str) -> Result<Arc<EntityType>, AppError> {
        let key = table.to_lowercase();
        let mut state = self.write();
        let entity = state
            .entities
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("table '{}' does not exist or no model has been created", table)))?;
        let Some(column) = state.suspended.remove(&key) else {
            return Ok(entity);
        };
        let mut restored = (*entity).clone();
        restored.columns.push(column);
        let restored = Arc::new(restored);
        state.entities.insert(key, restored.clone());
        tracing::info!(table = %table, "optimistic lock reopened");
        Ok(restored)
    }

    fn replace_entity(&self, table: &str, f: impl FnOnce(&EntityType) -> EntityType) -> Result<Arc<EntityType>, AppError> {
        let key = table.to_lowercase();
        let mut state = self.write();
        let current = state
            .entities
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("table '{}' does not exist or no model has been created", table)))?;
        let next = Arc::new(f(&current));
        state.entities.insert(key, next.clone());
        Ok(next)
    }
}
