//! Paginator: counts matching rows (optionally cached), fetches one page at a time and
//! optionally nests child rows under each parent.

use crate::context::ConnectionSet;
use crate::error::AppError;
use crate::keys;
use crate::model::{EntityType, ModelRegistry};
use crate::query::Predicate;
use crate::sql::{self, exec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Largest LIMIT or OFFSET both backends accept.
const MAX_ROW_INDEX: u64 = i64::MAX as u64;

/// What a paginator selects from.
#[derive(Clone, Debug, PartialEq)]
pub enum PageSource {
    /// A WHERE clause over the entity's table.
    Where(String),
    /// Every row of the table. Takes no parameters.
    All,
    /// A complete `SELECT ... FROM ...` statement.
    Select(String),
}

impl PageSource {
    /// `*` selects everything, text starting with `select` is a full query, anything else
    /// is a WHERE clause.
    pub fn parse(query: &str) -> Self {
        let q = query.trim();
        if q == "*" {
            PageSource::All
        } else if q.get(..7).map(|p| p.eq_ignore_ascii_case("select ")).unwrap_or(false) {
            PageSource::Select(q.to_string())
        } else {
            PageSource::Where(q.to_string())
        }
    }
}

/// One fetched page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub order_by: String,
    pub page_size: u64,
    pub current_page: u64,
    pub total: u64,
    pub rows: Vec<Map<String, Value>>,
}

pub struct PaginatorBuilder {
    registry: Arc<ModelRegistry>,
    entity: Arc<EntityType>,
    source: PageSource,
    params: Vec<Value>,
    count_query: Option<String>,
    order_by: String,
    columns: Vec<String>,
    page_size: u64,
    suppress_counts: bool,
    include: Vec<String>,
}

impl PaginatorBuilder {
    pub fn query(mut self, query: &str, params: Vec<Value>) -> Self {
        self.source = PageSource::parse(query);
        self.params = params;
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.source = PageSource::Where(predicate.clause);
        self.params = predicate.params;
        self
    }

    /// Expression counted in place of `COUNT(*)`, for queries spanning joins.
    pub fn count_query(mut self, expr: &str) -> Self {
        self.count_query = Some(expr.to_string()).filter(|e| !e.trim().is_empty());
        self
    }

    /// An ORDER BY expression already checked against the entity's columns.
    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = order_by.trim().to_string();
        self
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reuse the first count while this paginator moves between pages.
    pub fn suppress_counts(mut self, suppress: bool) -> Self {
        self.suppress_counts = suppress;
        self
    }

    /// Child tables to nest under each row. Only tables declared as children of the
    /// entity take part.
    pub fn include_children(mut self, children: Vec<String>) -> Self {
        self.include = children;
        self
    }

    pub fn build(self) -> Result<Paginator, AppError> {
        if self.page_size < 1 {
            return Err(AppError::Validation("pageSize must be at least 1".into()));
        }
        if self.page_size > MAX_ROW_INDEX {
            return Err(AppError::Validation(format!(
                "pageSize {} is larger than {}",
                self.page_size, MAX_ROW_INDEX
            )));
        }
        if self.source == PageSource::All && !self.params.is_empty() {
            return Err(AppError::Validation(
                "cannot provide parameters with query: '*'".into(),
            ));
        }
        Ok(Paginator {
            registry: self.registry,
            entity: self.entity,
            source: self.source,
            params: self.params,
            count_query: self.count_query,
            order_by: self.order_by,
            columns: self.columns,
            page_size: self.page_size,
            suppress_counts: self.suppress_counts,
            include: self.include,
            current_page: 1,
            count: None,
        })
    }
}

pub struct Paginator {
    registry: Arc<ModelRegistry>,
    entity: Arc<EntityType>,
    source: PageSource,
    params: Vec<Value>,
    count_query: Option<String>,
    order_by: String,
    columns: Vec<String>,
    page_size: u64,
    suppress_counts: bool,
    include: Vec<String>,
    current_page: u64,
    count: Option<u64>,
}

impl Paginator {
    /// Builder over every row of `entity`, ten rows a page.
    pub fn builder(registry: Arc<ModelRegistry>, entity: Arc<EntityType>) -> PaginatorBuilder {
        PaginatorBuilder {
            registry,
            entity,
            source: PageSource::Where(keys::WHERE_ALL.to_string()),
            params: Vec::new(),
            count_query: None,
            order_by: String::new(),
            columns: Vec::new(),
            page_size: keys::DEFAULT_PAGE_SIZE,
            suppress_counts: false,
            include: Vec::new(),
        }
    }

    pub fn entity(&self) -> &Arc<EntityType> {
        &self.entity
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    /// The count statement for the current source.
    pub fn count_sql(&self) -> Result<String, AppError> {
        let expr = self.count_query.as_deref().unwrap_or("COUNT(*)");
        match &self.source {
            PageSource::Where(clause) => Ok(format!(
                "SELECT {} FROM {} WHERE {}",
                expr,
                self.entity.quoted_table(),
                clause
            )),
            PageSource::All => Ok(match &self.count_query {
                Some(e) => format!("SELECT {} FROM {}", e, self.entity.quoted_table()),
                None => sql::count_all(&self.entity),
            }),
            PageSource::Select(full) => {
                let at = full.to_ascii_lowercase().find(" from ").ok_or_else(|| {
                    AppError::Validation(format!("query has no FROM clause: {}", full))
                })?;
                Ok(format!("SELECT {}{}", expr, &full[at..]))
            }
        }
    }

    /// Row offset of page `page` (1-based). Fails when it does not fit a signed 64-bit
    /// OFFSET.
    pub fn offset_of(&self, page: u64) -> Result<u64, AppError> {
        page.saturating_sub(1)
            .checked_mul(self.page_size)
            .filter(|offset| *offset <= MAX_ROW_INDEX)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "page {} of size {} is beyond the largest row offset",
                    page, self.page_size
                ))
            })
    }

    /// SELECT for page `page` (1-based). Offsets past the signed 64-bit range are clamped;
    /// `get_page` rejects them first.
    pub fn page_sql(&self, page: u64) -> String {
        let offset = page.saturating_sub(1).saturating_mul(self.page_size).min(MAX_ROW_INDEX);
        let projection = Some(self.columns.as_slice()).filter(|c| !c.is_empty());
        match &self.source {
            PageSource::Where(clause) => sql::select_page(
                &self.entity,
                projection,
                clause,
                &self.order_by,
                self.page_size,
                offset,
            ),
            PageSource::All => sql::select_page(
                &self.entity,
                projection,
                keys::WHERE_ALL,
                &self.order_by,
                self.page_size,
                offset,
            ),
            PageSource::Select(full) => {
                let mut q = full.clone();
                sql::push_order_limit(&mut q, &self.order_by, self.page_size, offset);
                q
            }
        }
    }

    /// Total matching rows. Recomputed on every call unless counts are suppressed for this
    /// paginator or the entity's counts go through the shared cache.
    pub async fn count(&mut self, conns: &mut ConnectionSet) -> Result<u64, AppError> {
        if self.suppress_counts {
            if let Some(n) = self.count {
                return Ok(n);
            }
        }
        let sql = self.count_sql()?;
        let table = &self.entity.table;
        if self.entity.cached {
            if let Some(n) = self.registry.counts().get(table, &sql, &self.params) {
                tracing::debug!(sql = %sql, params = ?self.params, count = n, "count cache hit");
                self.count = Some(n);
                return Ok(n);
            }
        }
        let conn = conns.acquire(&self.entity.datasource).await?;
        let n = exec::query_count(conn, &sql, &self.params).await?;
        if self.entity.cached {
            self.registry.counts().put(table, &sql, &self.params, n);
        }
        self.count = Some(n);
        Ok(n)
    }

    /// `ceil(count / page_size)`.
    pub async fn page_count(&mut self, conns: &mut ConnectionSet) -> Result<u64, AppError> {
        let n = self.count(conns).await?;
        Ok(n.div_ceil(self.page_size))
    }

    /// Move to page `index`. Fails below 1, and past the last page unless `skip_check`.
    pub async fn set_current_page(&mut self, conns: &mut ConnectionSet, index: u64, skip_check: bool) -> Result<(), AppError> {
        if index < 1 {
            return Err(AppError::Validation("currentPageIndex cannot be < 1".into()));
        }
        self.offset_of(index)?;
        if !skip_check {
            let pages = self.page_count(conns).await?;
            if index > pages {
                return Err(AppError::Validation(format!(
                    "page {} is outside of the record set ({} pages)",
                    index, pages
                )));
            }
        }
        self.current_page = index;
        Ok(())
    }

    /// Rows of page `page` (1-based), which becomes the current page.
    pub async fn get_page(&mut self, conns: &mut ConnectionSet, page: u64) -> Result<Vec<Map<String, Value>>, AppError> {
        if page < 1 {
            return Err(AppError::Validation("minimum page index == 1".into()));
        }
        self.offset_of(page)?;
        let sql = self.page_sql(page);
        let conn = conns.acquire(&self.entity.datasource).await?;
        let mut rows = exec::query_many(conn, &sql, &self.params).await?;
        self.current_page = page;
        if !self.include.is_empty() {
            let include = self.include.clone();
            attach_children(conns, &self.registry, &self.entity, &mut rows, &include).await?;
        }
        Ok(rows)
    }

    pub async fn has_next(&mut self, conns: &mut ConnectionSet) -> Result<bool, AppError> {
        Ok(self.current_page < self.page_count(conns).await?)
    }

    pub async fn has_previous(&mut self, conns: &mut ConnectionSet) -> Result<bool, AppError> {
        Ok(self.current_page > 1 && self.current_page <= self.page_count(conns).await?)
    }

    /// 1-based index of the first row of the current page.
    pub fn from(&self) -> u64 {
        self.current_page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .saturating_add(1)
    }

    /// 1-based index of the last row of the current page.
    pub async fn to(&mut self, conns: &mut ConnectionSet) -> Result<u64, AppError> {
        let n = self.count(conns).await?;
        Ok(self.current_page.saturating_mul(self.page_size).min(n))
    }

    /// Count, then fetch the current page.
    pub async fn apply(&mut self, conns: &mut ConnectionSet) -> Result<PageResult, AppError> {
        let page = self.current_page;
        let total = self.count(conns).await?;
        let rows = self.get_page(conns, page).await?;
        Ok(PageResult {
            order_by: self.order_by.clone(),
            page_size: self.page_size,
            current_page: page,
            total,
            rows,
        })
    }
}

/// Nest the live rows of each requested child table under `row["children"][child]`,
/// loaded with one query per child scoped by the parents' ids.
pub(crate) async fn attach_children(
    conns: &mut ConnectionSet,
    registry: &ModelRegistry,
    parent: &EntityType,
    rows: &mut [Map<String, Value>],
    include: &[String],
) -> Result<(), AppError> {
    let id_key = parent.id_column.to_lowercase();
    let ids: Vec<Value> = rows
        .iter()
        .filter_map(|r| r.get(&id_key).filter(|v| !v.is_null()).cloned())
        .collect();
    for assoc in registry.children_of(&parent.table) {
        if !include.iter().any(|c| c.eq_ignore_ascii_case(&assoc.child)) {
            continue;
        }
        let child = registry.lookup(&assoc.child)?;
        let mut loaded = Vec::new();
        for chunk in ids.chunks(keys::MAX_IN_LIST) {
            let q = sql::select_by_column_in(&child, &assoc.foreign_key, chunk);
            let conn = conns.acquire(&child.datasource).await?;
            loaded.extend(exec::query_many(conn, &q.sql, &q.params).await?);
        }
        let fk_key = assoc.foreign_key.to_lowercase();
        for row in rows.iter_mut() {
            let Some(id) = row.get(&id_key).cloned() else { continue };
            let nested: Vec<Value> = loaded
                .iter()
                .filter(|c| c.get(&fk_key).map(|v| same_key(v, &id)).unwrap_or(false))
                .filter(|c| !is_deleted(c))
                .cloned()
                .map(Value::Object)
                .collect();
            let slot = row
                .entry(keys::CHILDREN.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(children) = slot {
                children.insert(child.key(), Value::Array(nested));
            }
        }
    }
    Ok(())
}

/// A row whose soft-delete flag is set to anything other than zero.
pub(crate) fn is_deleted(row: &Map<String, Value>) -> bool {
    match row.get(&keys::IS_DELETE.to_lowercase()) {
        None | Some(Value::Null) => false,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s != keys::NOT_DELETED
        }
        Some(_) => true,
    }
}

/// Key equality across the number/text forms drivers return.
fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::String(s), other) | (other, Value::String(s)) => *s == other.to_string(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnMeta;
    use crate::sql::Dialect;
    use serde_json::json;

    fn paginator(query: &str, params: Vec<Value>) -> PaginatorBuilder {
        let registry = Arc::new(ModelRegistry::new());
        let entity = registry.register_table(
            "orders",
            "id",
            "master",
            Dialect::Sqlite,
            vec![
                ColumnMeta::new("id", "INTEGER", false, true),
                ColumnMeta::new("status", "TEXT", true, false),
            ],
        );
        Paginator::builder(registry, entity).query(query, params)
    }

    #[test]
    fn parses_query_forms() {
        assert_eq!(PageSource::parse(" * "), PageSource::All);
        assert_eq!(
            PageSource::parse("SELECT a FROM t"),
            PageSource::Select("SELECT a FROM t".into())
        );
        assert_eq!(PageSource::parse("status = ?"), PageSource::Where("status = ?".into()));
    }

    #[test]
    fn count_and_page_sql_for_where_clause() {
        let p = paginator("STATUS = ?", vec![json!("open")])
            .order_by("ID DESC")
            .page_size(20)
            .build()
            .unwrap();
        assert_eq!(p.count_sql().unwrap(), "SELECT COUNT(*) FROM `orders` WHERE STATUS = ?");
        assert_eq!(
            p.page_sql(3),
            "SELECT `ID`, `STATUS` FROM `orders` WHERE STATUS = ? ORDER BY ID DESC LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn full_select_counts_from_its_from_clause() {
        let p = paginator("select o.ID from orders o join lines l on l.ORDER_ID = o.ID", vec![])
            .count_query("COUNT(DISTINCT o.ID)")
            .build()
            .unwrap();
        assert_eq!(
            p.count_sql().unwrap(),
            "SELECT COUNT(DISTINCT o.ID) from orders o join lines l on l.ORDER_ID = o.ID"
        );
        assert!(p.page_sql(1).ends_with(" LIMIT 10 OFFSET 0"));
    }

    #[test]
    fn star_rejects_params_and_zero_page_size_is_invalid() {
        assert!(paginator("*", vec![json!(1)]).build().is_err());
        assert!(paginator("*", vec![]).page_size(0).build().is_err());
        let p = paginator("*", vec![]).build().unwrap();
        assert_eq!(p.count_sql().unwrap(), "SELECT COUNT(*) FROM `orders`");
    }

    #[test]
    fn offsets_past_the_signed_range_are_rejected() {
        let p = paginator("*", vec![]).build().unwrap();
        assert_eq!(p.offset_of(3).unwrap(), 20);
        assert!(p.offset_of(i64::MAX as u64).is_err());
        assert!(p.offset_of(u64::MAX).is_err());
        // clamped, not wrapped
        assert!(p.page_sql(u64::MAX).ends_with(&format!(" OFFSET {}", i64::MAX)));
        assert!(paginator("*", vec![]).page_size(u64::MAX).build().is_err());
    }

    #[test]
    fn deleted_flag_forms() {
        let row = |v: Value| json!({ "is_delete": v }).as_object().cloned().unwrap();
        assert!(is_deleted(&row(json!(1))));
        assert!(is_deleted(&row(json!("1"))));
        assert!(!is_deleted(&row(json!(0))));
        assert!(!is_deleted(&row(json!("0"))));
        assert!(!is_deleted(&row(Value::Null)));
        assert!(same_key(&json!("5"), &json!(5)));
    }
}
