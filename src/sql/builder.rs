//! Builds parameterized SELECT, COUNT, INSERT, UPDATE and REPLACE statements from an entity type.

use crate::keys;
use crate::model::EntityType;
use serde_json::{Map, Value};

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> &'static str {
        self.params.push(v);
        "?"
    }
}

/// SELECT list: every column (or the projection, restricted to known columns), cast where needed.
pub fn select_column_list(entity: &EntityType, projection: Option<&[String]>) -> String {
    let cols: Vec<String> = entity
        .columns
        .iter()
        .filter(|c| match projection {
            Some(p) if !p.is_empty() => {
                c.name == entity.id_column || p.iter().any(|name| name.eq_ignore_ascii_case(&c.name))
            }
            _ => true,
        })
        .map(|c| entity.dialect.select_expr(&c.name, &c.sql_type))
        .collect();
    cols.join(", ")
}

/// `SELECT COUNT(*) FROM t WHERE <clause>`.
pub fn count(entity: &EntityType, where_clause: &str) -> String {
    format!("SELECT COUNT(*) FROM {} WHERE {}", entity.quoted_table(), where_clause)
}

/// `SELECT COUNT(*) FROM t`.
pub fn count_all(entity: &EntityType) -> String {
    format!("SELECT COUNT(*) FROM {}", entity.quoted_table())
}

/// One page: optional ORDER BY, then LIMIT/OFFSET.
pub fn select_page(
    entity: &EntityType,
    projection: Option<&[String]>,
    where_clause: &str,
    order_by: &str,
    limit: u64,
    offset: u64,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(entity, projection),
        entity.quoted_table(),
        where_clause
    );
    push_order_limit(&mut sql, order_by, limit, offset);
    sql
}

/// Appends ` ORDER BY <order_by>` when non-empty, then ` LIMIT n OFFSET m`.
pub fn push_order_limit(sql: &mut String, order_by: &str, limit: u64, offset: u64) {
    if !order_by.trim().is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
}

/// SELECT by primary key.
pub fn select_by_id(entity: &EntityType, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity, None),
        entity.quoted_table(),
        entity.dialect.quote(&entity.id_column),
        ph
    );
    q
}

/// First row matching a clause, ordered by primary key.
pub fn select_first(entity: &EntityType, where_clause: &str, params: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.params.extend_from_slice(params);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT 1",
        select_column_list(entity, None),
        entity.quoted_table(),
        where_clause,
        entity.dialect.quote(&entity.id_column)
    );
    q
}

/// SELECT * FROM entity WHERE column IN (?, ?, ...) ORDER BY pk. Used for batch-loading child rows.
pub fn select_by_column_in(entity: &EntityType, column_name: &str, values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(entity, None);
    let table = entity.quoted_table();
    if values.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let placeholders: Vec<&str> = values.iter().map(|v| q.push_param(v.clone())).collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
        cols,
        table,
        entity.dialect.quote(column_name),
        placeholders.join(", "),
        entity.dialect.quote(&entity.id_column)
    );
    q
}

/// INSERT of the attributes that name a column. A generated id without a value is left to the database.
pub fn insert(entity: &EntityType, attrs: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = lookup(attrs, &c.name) else { continue };
        if c.name == entity.id_column && c.generated && is_blank(val) {
            continue;
        }
        placeholders.push(q.push_param(val.clone()));
        cols.push(entity.dialect.quote(&c.name));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} ({}) VALUES (NULL)", entity.quoted_table(), entity.dialect.quote(&entity.id_column))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity.quoted_table(),
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE by id: SET every attribute naming a non-id column. When the entity carries the
/// version column it is incremented, and a non-null `version` is checked in the WHERE clause.
/// Returns None when there is nothing to set.
pub fn update(entity: &EntityType, id: &Value, attrs: &Map<String, Value>, version: Option<&Value>) -> Option<QueryBuf> {
    let mut q = QueryBuf::new();
    let d = entity.dialect;
    let versioned = entity.has_version();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.name == entity.id_column || (versioned && c.name == keys::RECORD_VERSION) {
            continue;
        }
        let Some(val) = lookup(attrs, &c.name) else { continue };
        let ph = q.push_param(val.clone());
        sets.push(format!("{} = {}", d.quote(&c.name), ph));
    }
    if sets.is_empty() {
        return None;
    }
    let checked = versioned && version.map(|v| !v.is_null()).unwrap_or(false);
    if versioned {
        let v = d.quote(keys::RECORD_VERSION);
        sets.push(format!("{} = COALESCE({}, 0) + 1", v, v));
    }
    let id_ph = q.push_param(id.clone());
    let mut sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        entity.quoted_table(),
        sets.join(", "),
        d.quote(&entity.id_column),
        id_ph
    );
    if checked {
        if let Some(v) = version {
            let ph = q.push_param(v.clone());
            sql.push_str(&format!(" AND {} = {}", d.quote(keys::RECORD_VERSION), ph));
        }
    }
    q.sql = sql;
    Some(q)
}

/// Flag rows deleted by id.
pub fn soft_delete(entity: &EntityType, ids: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let d = entity.dialect;
    let flag = q.push_param(Value::String(keys::DELETED.to_string()));
    let placeholders: Vec<&str> = ids.iter().map(|id| q.push_param(id.clone())).collect();
    q.sql = format!(
        "UPDATE {} SET {} = {} WHERE {} IN ({})",
        entity.quoted_table(),
        d.quote(keys::IS_DELETE),
        flag,
        d.quote(&entity.id_column),
        placeholders.join(", ")
    );
    q
}

/// Give unversioned rows version 1.
pub fn backfill_version(entity: &EntityType) -> String {
    let v = entity.dialect.quote(keys::RECORD_VERSION);
    format!("UPDATE {} SET {} = 1 WHERE {} IS NULL", entity.quoted_table(), v, v)
}

/// Insert-or-replace script per chunk of `batch_size` rows: one `REPLACE INTO` per row,
/// values inlined as escaped literals, statements joined by `;`.
pub fn replace_batches(entity: &EntityType, rows: &[Map<String, Value>], batch_size: usize) -> Vec<String> {
    let d = entity.dialect;
    rows.chunks(batch_size.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .filter_map(|row| {
                    let (cols, vals): (Vec<String>, Vec<String>) = entity
                        .columns
                        .iter()
                        .filter_map(|c| lookup(row, &c.name).map(|v| (d.quote(&c.name), d.literal(v))))
                        .unzip();
                    if cols.is_empty() {
                        return None;
                    }
                    Some(format!(
                        "REPLACE INTO {} ({}) VALUES ({})",
                        entity.quoted_table(),
                        cols.join(", "),
                        vals.join(", ")
                    ))
                })
                .collect::<Vec<_>>()
                .join(";\n")
        })
        .filter(|script| !script.is_empty())
        .collect()
}

/// Case-insensitive attribute lookup.
pub fn lookup<'a>(attrs: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    attrs
        .get(column)
        .or_else(|| attrs.iter().find(|(k, _)| k.eq_ignore_ascii_case(column)).map(|(_, v)| v))
}

/// Null, or a string that is empty after trimming.
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnMeta;
    use crate::sql::Dialect;
    use serde_json::json;

    fn entity() -> EntityType {
        EntityType::new(
            "orders",
            "id",
            "master",
            Dialect::Sqlite,
            vec![
                ColumnMeta::new("id", "INTEGER", false, true),
                ColumnMeta::new("name", "TEXT", true, false),
                ColumnMeta::new("record_version", "INTEGER", true, false),
            ],
        )
    }

    fn attrs(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_skips_blank_generated_id() {
        let q = insert(&entity(), &attrs(json!({"id": "", "name": "a", "other": 1})));
        assert_eq!(q.sql, "INSERT INTO `orders` (`NAME`) VALUES (?)");
        assert_eq!(q.params, vec![json!("a")]);
    }

    #[test]
    fn update_checks_version() {
        let q = update(&entity(), &json!(3), &attrs(json!({"NAME": "b", "ID": 3})), Some(&json!(2))).unwrap();
        assert_eq!(
            q.sql,
            "UPDATE `orders` SET `NAME` = ?, `RECORD_VERSION` = COALESCE(`RECORD_VERSION`, 0) + 1 WHERE `ID` = ? AND `RECORD_VERSION` = ?"
        );
        assert_eq!(q.params, vec![json!("b"), json!(3), json!(2)]);
        let unlocked = entity().without_column("RECORD_VERSION");
        let q = update(&unlocked, &json!(3), &attrs(json!({"name": "b"})), Some(&json!(2))).unwrap();
        assert_eq!(q.sql, "UPDATE `orders` SET `NAME` = ? WHERE `ID` = ?");
        assert!(update(&entity(), &json!(3), &attrs(json!({"id": 3})), None).is_none());
    }

    #[test]
    fn page_order_is_optional() {
        let e = entity();
        let sql = select_page(&e, Some(&["name".to_string()]), "1", "", 10, 20);
        assert_eq!(sql, "SELECT `ID`, `NAME` FROM `orders` WHERE 1 LIMIT 10 OFFSET 20");
        let sql = select_page(&e, None, "1", "`NAME` DESC", 5, 0);
        assert!(sql.ends_with("WHERE 1 ORDER BY `NAME` DESC LIMIT 5 OFFSET 0"));
    }

    #[test]
    fn replace_batches_chunk_rows() {
        let rows: Vec<_> = (1..=5).map(|i| attrs(json!({"id": i, "name": format!("n'{}", i)}))).collect();
        let batches = replace_batches(&entity(), &rows, 2);
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches[0],
            "REPLACE INTO `orders` (`ID`, `NAME`) VALUES (1, 'n''1');\nREPLACE INTO `orders` (`ID`, `NAME`) VALUES (2, 'n''2')"
        );
    }

    #[test]
    fn in_list_with_no_values_matches_nothing() {
        let q = select_by_column_in(&entity(), "NAME", &[]);
        assert!(q.sql.ends_with("WHERE 1 = 0"));
        let q = soft_delete(&entity(), &[json!(1), json!(2)]);
        assert_eq!(q.sql, "UPDATE `orders` SET `IS_DELETE` = ? WHERE `ID` IN (?, ?)");
        assert_eq!(q.params[0], json!("1"));
    }
}
