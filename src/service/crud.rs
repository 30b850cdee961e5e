//! Generic row operations against any registered table.

use crate::context::{join_all, spawn_transaction, with_transaction, ConnectionSet, DataSources, TaskPool};
use crate::error::AppError;
use crate::keys;
use crate::model::{EntityType, ModelRegistry, Row};
use crate::paginator::{attach_children, PageResult, Paginator};
use crate::query::{compile_map, de_layer, MatchMode, PageRequest, QueryFilter};
use crate::sql::{self, exec, is_blank};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Row operations for every table in the registry. Cheap to clone; clones share pools,
/// models and the worker pool.
#[derive(Clone)]
pub struct CrudService {
    sources: DataSources,
    registry: Arc<ModelRegistry>,
    tasks: TaskPool,
    audit_user: String,
    batch_size: usize,
}

impl CrudService {
    pub fn new(sources: DataSources, registry: Arc<ModelRegistry>, tasks: TaskPool) -> Self {
        CrudService {
            sources,
            registry,
            tasks,
            audit_user: String::new(),
            batch_size: keys::BATCH_SIZE,
        }
    }

    /// Name written to CREATED_BY / UPDATED_BY.
    pub fn with_audit_user(mut self, user: &str) -> Self {
        self.audit_user = user.to_string();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    pub fn entity(&self, table: &str) -> Result<Arc<EntityType>, AppError> {
        self.registry.lookup(table)
    }

    /// `with_transaction` over this service's datasources.
    pub async fn transaction<T, F>(&self, keys: &[&str], body: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut ConnectionSet) -> BoxFuture<'c, Result<T, AppError>>,
    {
        with_transaction(&self.sources, keys, body).await
    }

    /// Row by primary key, soft-deleted or not.
    pub async fn find_by_id(&self, conns: &mut ConnectionSet, table: &str, id: &Value) -> Result<Map<String, Value>, AppError> {
        if is_blank(id) {
            return Err(AppError::Validation(format!("invalid id for {}: {}", table, id)));
        }
        let entity = self.entity(table)?;
        let q = sql::select_by_id(&entity, id);
        let conn = conns.acquire(&entity.datasource).await?;
        exec::query_one(conn, &q.sql, &q.params)
            .await?
            .ok_or_else(|| AppError::NotFound("object not exists".into()))
    }

    /// First row, by primary key, matching a WHERE clause.
    pub async fn find_first(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        where_clause: &str,
        params: &[Value],
    ) -> Result<Option<Map<String, Value>>, AppError> {
        let entity = self.entity(table)?;
        let q = sql::select_first(&entity, where_clause, params);
        let conn = conns.acquire(&entity.datasource).await?;
        exec::query_one(conn, &q.sql, &q.params).await
    }

    /// First row whose columns equal the non-empty values in `attrs`, or, when none matches,
    /// a new row created from `attrs`. Keys naming no column are ignored; at least one
    /// must name a column.
    pub async fn find_or_init(&self, conns: &mut ConnectionSet, table: &str, attrs: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        let entity = self.entity(table)?;
        let mut criteria = attrs.clone();
        criteria.remove(keys::IS_OR);
        let predicate = compile_map(&entity, &criteria, MatchMode::Exact);
        if predicate.clause == keys::WHERE_ALL {
            return Err(AppError::Validation(format!(
                "no column of {} to match on",
                entity.table
            )));
        }
        if let Some(found) = self.find_first(conns, table, &predicate.clause, &predicate.params).await? {
            return Ok(found);
        }
        tracing::debug!(table = %entity.table, "no match, creating");
        self.create(conns, table, &criteria).await
    }

    /// Insert a new row or update an existing one. New rows get the live soft-delete flag,
    /// version 1 and CREATED_BY; updates get UPDATED_BY and, when the table is versioned
    /// and the row carries its version, a version check.
    pub async fn save(&self, conns: &mut ConnectionSet, row: &mut Row) -> Result<(), AppError> {
        let entity = row.entity().clone();
        if row.is_new() {
            self.insert_row(conns, &entity, row).await?;
        } else {
            self.update_row(conns, &entity, row).await?;
        }
        self.registry.counts().purge(&entity.table);
        Ok(())
    }

    async fn insert_row(&self, conns: &mut ConnectionSet, entity: &EntityType, row: &mut Row) -> Result<(), AppError> {
        if entity.has_soft_delete() && row.get(keys::IS_DELETE).map(is_blank).unwrap_or(true) {
            row.set(keys::IS_DELETE, Value::String(keys::NOT_DELETED.into()))?;
        }
        if entity.has_version() && row.get(keys::RECORD_VERSION).map(Value::is_null).unwrap_or(true) {
            row.set(keys::RECORD_VERSION, Value::from(1))?;
        }
        if !self.audit_user.is_empty() && entity.has_column(keys::CREATED_BY) {
            row.set(keys::CREATED_BY, Value::String(self.audit_user.clone()))?;
        }
        let q = sql::insert(entity, row.attributes());
        let conn = conns.acquire(&entity.datasource).await?;
        let done = exec::execute(conn, &q.sql, &q.params).await?;
        let id = match row.id().filter(|v| !is_blank(v)) {
            Some(id) => id.clone(),
            None => done.last_insert_id().map(Value::from).unwrap_or(Value::Null),
        };
        tracing::debug!(table = %entity.table, id = %id, "row inserted");
        row.mark_saved(Some(id));
        Ok(())
    }

    async fn update_row(&self, conns: &mut ConnectionSet, entity: &EntityType, row: &mut Row) -> Result<(), AppError> {
        let id = row
            .id()
            .cloned()
            .filter(|v| !is_blank(v))
            .ok_or_else(|| AppError::Validation(format!("{} row has no id", entity.table)))?;
        if !self.audit_user.is_empty() && entity.has_column(keys::UPDATED_BY) {
            row.set(keys::UPDATED_BY, Value::String(self.audit_user.clone()))?;
        }
        let version = row.get(keys::RECORD_VERSION).cloned().filter(|v| !v.is_null());
        let Some(q) = sql::update(entity, &id, &row.changes(), version.as_ref()) else {
            row.mark_saved(None);
            return Ok(());
        };
        let conn = conns.acquire(&entity.datasource).await?;
        let done = exec::execute(conn, &q.sql, &q.params).await?;
        if entity.has_version() {
            if let Some(v) = version {
                if done.rows_affected() == 0 {
                    return Err(AppError::StaleRecord {
                        table: entity.table.clone(),
                        id: id.to_string(),
                    });
                }
                let next = v.as_i64().map(|n| Value::from(n + 1)).unwrap_or(v);
                row.set(keys::RECORD_VERSION, next)?;
            }
        }
        row.mark_saved(None);
        Ok(())
    }

    /// Insert `attrs` as a new row. Returns the stored attributes with the assigned id.
    pub async fn create(&self, conns: &mut ConnectionSet, table: &str, attrs: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        let mut row = Row::new(self.entity(table)?);
        for (k, v) in attrs {
            if row.entity().has_column(k) {
                row.set(k, v.clone())?;
            }
        }
        self.save(conns, &mut row).await?;
        Ok(row.to_map())
    }

    /// Update the row with primary key `id` from `attrs`.
    pub async fn save_by_id(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        id: &Value,
        attrs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        if is_blank(id) {
            return Err(AppError::Validation(format!("invalid id for {}: {}", table, id)));
        }
        let entity = self.entity(table)?;
        let mut attrs = attrs.clone();
        attrs.retain(|k, _| !k.eq_ignore_ascii_case(&entity.id_column));
        attrs.insert(entity.id_column.clone(), id.clone());
        let mut row = Row::from_map(entity, &attrs);
        self.save(conns, &mut row).await?;
        Ok(row.to_map())
    }

    /// Update when `attrs` carries a non-empty id, insert otherwise.
    pub async fn create_or_update(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        attrs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        let mut row = Row::from_map(self.entity(table)?, attrs);
        self.save(conns, &mut row).await?;
        Ok(row.to_map())
    }

    /// Flag one row deleted.
    pub async fn delete_tag(&self, conns: &mut ConnectionSet, table: &str, id: &Value) -> Result<u64, AppError> {
        self.delete_tags(conns, table, std::slice::from_ref(id)).await
    }

    /// Flag rows deleted by id. Returns the number of rows flagged.
    pub async fn delete_tags(&self, conns: &mut ConnectionSet, table: &str, ids: &[Value]) -> Result<u64, AppError> {
        let entity = self.entity(table)?;
        if !entity.has_soft_delete() {
            return Err(AppError::Validation(format!(
                "{} has no {} column",
                entity.table,
                keys::IS_DELETE
            )));
        }
        if ids.is_empty() || ids.iter().any(is_blank) {
            return Err(AppError::Validation(format!("invalid id list for {}", entity.table)));
        }
        let mut flagged = 0;
        for chunk in ids.chunks(keys::MAX_IN_LIST) {
            let q = sql::soft_delete(&entity, chunk);
            let conn = conns.acquire(&entity.datasource).await?;
            flagged += exec::execute(conn, &q.sql, &q.params).await?.rows_affected();
        }
        self.registry.counts().purge(&entity.table);
        tracing::info!(table = %entity.table, rows = flagged, "rows flagged deleted");
        Ok(flagged)
    }

    /// Create or update every row in order on the caller's connections.
    pub async fn batch_create_or_update(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        rows: &[Map<String, Value>],
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let mut saved = Vec::with_capacity(rows.len());
        for attrs in rows {
            saved.push(self.create_or_update(conns, table, attrs).await?);
        }
        Ok(saved)
    }

    /// Create or update every row on the worker pool, each in its own transaction, then
    /// wait for all of them. Rows that succeeded stay committed when another fails.
    pub async fn batch_async_create_or_update(
        &self,
        table: &str,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let entity = self.entity(table)?;
        let handles = rows
            .into_iter()
            .map(|attrs| {
                let svc = self.clone();
                let table = entity.table.clone();
                spawn_transaction(&self.tasks, &self.sources, vec![entity.datasource.clone()], move |conns| {
                    Box::pin(async move { svc.create_or_update(conns, &table, &attrs).await })
                })
            })
            .collect();
        join_all(handles).await
    }

    /// `batch_async_create_or_update` with each row's version cleared, so updates skip the
    /// version check and new rows start at version 1.
    pub async fn batch_async_create_or_update_ignore_version(
        &self,
        table: &str,
        rows: Vec<Map<String, Value>>,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let rows = rows
            .into_iter()
            .map(|mut attrs| {
                attrs.retain(|k, _| !k.eq_ignore_ascii_case(keys::RECORD_VERSION));
                attrs.insert(keys::RECORD_VERSION.to_string(), Value::Null);
                attrs
            })
            .collect();
        self.batch_async_create_or_update(table, rows).await
    }

    /// Insert-or-replace `rows` in batches of the configured size. Values are inlined as
    /// escaped literals. Returns the rows affected as reported by the driver.
    pub async fn replace_batch(&self, conns: &mut ConnectionSet, table: &str, rows: &[Map<String, Value>]) -> Result<u64, AppError> {
        let entity = self.entity(table)?;
        let mut affected = 0;
        for script in sql::replace_batches(&entity, rows, self.batch_size) {
            let conn = conns.acquire(&entity.datasource).await?;
            affected += exec::execute_script(conn, &script).await?;
        }
        self.registry.counts().purge(&entity.table);
        tracing::info!(table = %entity.table, rows = rows.len(), "rows replaced");
        Ok(affected)
    }

    /// Page of rows matching a flat filter map that also carries paging and sort keys.
    pub async fn page_query(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        input: Map<String, Value>,
        mode: MatchMode,
    ) -> Result<PageResult, AppError> {
        self.paged(conns, table, input, mode, false).await
    }

    /// `page_query` with every declared child table nested under each row.
    pub async fn include_page_query(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        input: Map<String, Value>,
        mode: MatchMode,
    ) -> Result<PageResult, AppError> {
        self.paged(conns, table, input, mode, true).await
    }

    async fn paged(
        &self,
        conns: &mut ConnectionSet,
        table: &str,
        input: Map<String, Value>,
        mode: MatchMode,
        with_children: bool,
    ) -> Result<PageResult, AppError> {
        let entity = self.entity(table)?;
        let input = de_layer(input)?;
        let predicate = compile_map(&entity, &input, mode);
        let request = PageRequest::from_map(&entity, &input)?;
        let include = if with_children {
            self.registry
                .children_of(&entity.table)
                .into_iter()
                .map(|a| a.child)
                .collect()
        } else {
            Vec::new()
        };
        let mut paginator = Paginator::builder(self.registry.clone(), entity)
            .filter(predicate)
            .order_by(&request.order_by)
            .page_size(request.page_size)
            .include_children(include)
            .build()?;
        paginator.set_current_page(conns, request.page_num, true).await?;
        paginator.apply(conns).await
    }

    /// Page of rows matching a structured filter.
    pub async fn filter_search(&self, conns: &mut ConnectionSet, table: &str, filter: &QueryFilter) -> Result<PageResult, AppError> {
        let entity = self.entity(table)?;
        let predicate = filter.compile(&entity)?;
        let order_by = filter.order_by(&entity)?;
        let columns = filter.select_columns(&entity);
        let mut paginator = Paginator::builder(self.registry.clone(), entity)
            .filter(predicate)
            .order_by(&order_by)
            .columns(columns)
            .page_size(filter.page_size)
            .build()?;
        paginator.set_current_page(conns, filter.page_num, true).await?;
        paginator.apply(conns).await
    }

    /// Row by id with its declared children nested, recursively, under `children`.
    /// Soft-deleted children are left out. A table already on the path is not descended into again.
    pub async fn find_with_children(&self, conns: &mut ConnectionSet, table: &str, id: &Value) -> Result<Map<String, Value>, AppError> {
        let entity = self.entity(table)?;
        let mut row = self.find_by_id(conns, table, id).await?;
        let mut path = HashSet::new();
        path.insert(entity.key());
        self.load_children(conns, entity, std::slice::from_mut(&mut row), path).await?;
        Ok(row)
    }

    fn load_children<'a>(
        &'a self,
        conns: &'a mut ConnectionSet,
        entity: Arc<EntityType>,
        rows: &'a mut [Map<String, Value>],
        path: HashSet<String>,
    ) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            let children: Vec<String> = self
                .registry
                .children_of(&entity.table)
                .into_iter()
                .map(|a| a.child)
                .filter(|c| !path.contains(c))
                .collect();
            if children.is_empty() || rows.is_empty() {
                return Ok(());
            }
            attach_children(conns, &self.registry, &entity, rows, &children).await?;
            for child_table in children {
                let child = self.registry.lookup(&child_table)?;
                let mut nested = path.clone();
                nested.insert(child.key());
                for row in rows.iter_mut() {
                    let Some(Value::Object(slots)) = row.get_mut(keys::CHILDREN) else { continue };
                    let Some(Value::Array(items)) = slots.get_mut(&child.key()) else { continue };
                    let mut maps: Vec<Map<String, Value>> = items
                        .drain(..)
                        .filter_map(|v| match v {
                            Value::Object(m) => Some(m),
                            _ => None,
                        })
                        .collect();
                    self.load_children(&mut *conns, child.clone(), &mut maps, nested.clone()).await?;
                    *items = maps.into_iter().map(Value::Object).collect();
                }
            }
            Ok(())
        })
    }

    /// Restore the version column of `table` and give rows without a version version 1.
    /// Returns the number of rows back-filled.
    pub async fn open_lock(&self, conns: &mut ConnectionSet, table: &str) -> Result<u64, AppError> {
        let entity = self.registry.reopen_lock(table)?;
        if !entity.has_version() {
            return Ok(0);
        }
        let sql = sql::backfill_version(&entity);
        let conn = conns.acquire(&entity.datasource).await?;
        let done = exec::execute(conn, &sql, &[]).await?;
        Ok(done.rows_affected())
    }

    /// Remove the version column of `table` from its model so writes skip version checks,
    /// until `open_lock`.
    pub fn close_lock(&self, table: &str) -> Result<(), AppError> {
        self.registry.close_lock(table)
    }
}
