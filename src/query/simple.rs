//! Flat key/value filter maps: the request map a caller posts, compiled against an entity's columns.

use crate::error::AppError;
use crate::keys;
use crate::model::EntityType;
use crate::query::sort::{order_by_clause, parse_sort};
use crate::query::Predicate;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// `COLUMN = ?`
    Exact,
    /// `COLUMN like ?` with the value wrapped in `%`.
    Fuzzy,
}

/// Compile a flat map against `entity`. Each column with a non-null, non-empty value under a
/// key matching its name (any case) participates; everything else is ignored. No participant
/// gives the match-all clause `1`.
pub fn compile_map(entity: &EntityType, input: &Map<String, Value>, mode: MatchMode) -> Predicate {
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for c in &entity.columns {
        let Some(value) = find_value(input, &c.name) else { continue };
        columns.push(c.name.as_str());
        params.push(match mode {
            MatchMode::Exact => value,
            MatchMode::Fuzzy => Value::String(format!(
                "{}{}{}",
                keys::LIKE_WILDCARD,
                scalar_text(&value),
                keys::LIKE_WILDCARD
            )),
        });
    }
    if columns.is_empty() {
        return Predicate::all();
    }
    let op = match mode {
        MatchMode::Exact => "=",
        MatchMode::Fuzzy => "like",
    };
    let joiner = if is_or(input) { " OR " } else { " AND " };
    let parts: Vec<String> = columns.iter().map(|c| format!("{} {} ?", c, op)).collect();
    Predicate {
        clause: format!(" 1 AND( {} )", parts.join(joiner)),
        params,
    }
}

/// The `isOr` flag: boolean `true` or the string "true".
pub fn is_or(input: &Map<String, Value>) -> bool {
    match input.get(keys::IS_OR) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Merge a JSON object held as a string under `input` into the map itself.
/// Keys already present at the top level win.
pub fn de_layer(mut input: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    let nested = match input.remove(keys::INPUT) {
        Some(Value::String(s)) if !s.trim().is_empty() => serde_json::from_str::<Value>(&s)
            .map_err(|e| AppError::Validation(format!("'{}' is not valid JSON: {}", keys::INPUT, e)))?,
        Some(Value::Object(m)) => Value::Object(m),
        Some(_) | None => return Ok(input),
    };
    let Value::Object(nested) = nested else {
        return Err(AppError::Validation(format!("'{}' must hold a JSON object", keys::INPUT)));
    };
    for (k, v) in nested {
        input.entry(k).or_insert(v);
    }
    Ok(input)
}

/// Paging and ordering read from the same flat map.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub page_num: u64,
    pub page_size: u64,
    pub order_by: String,
}

impl PageRequest {
    /// `pageNum` (default 1), `pageSize` (default 10), and `sort`/`order` checked against `entity`.
    pub fn from_map(entity: &EntityType, input: &Map<String, Value>) -> Result<Self, AppError> {
        let page_num = read_u64(input, keys::PAGE_NUM)?.unwrap_or(keys::DEFAULT_PAGE_NUM);
        let page_size = read_u64(input, keys::PAGE_SIZE)?.unwrap_or(keys::DEFAULT_PAGE_SIZE);
        let order_by = match input.get(keys::SORT).and_then(Value::as_str) {
            Some(sort) if !sort.trim().is_empty() => {
                let order = input.get(keys::ORDER).and_then(Value::as_str);
                order_by_clause(&parse_sort(sort, order)?, entity)?
            }
            _ => String::new(),
        };
        Ok(PageRequest {
            page_num,
            page_size,
            order_by,
        })
    }
}

fn read_u64(input: &Map<String, Value>, key: &str) -> Result<Option<u64>, AppError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{} must be a positive integer, got {}", key, n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{} must be a positive integer, got {}", key, s))),
        Some(other) => Err(AppError::Validation(format!(
            "{} must be a positive integer, got {}",
            key, other
        ))),
    }
}

/// Value under a key equal to `column` in any case, when it is non-null and non-empty.
fn find_value(input: &Map<String, Value>, column: &str) -> Option<Value> {
    input
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column))
        .map(|(_, v)| v)
        .filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        })
        .cloned()
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnMeta;
    use crate::sql::Dialect;
    use serde_json::json;

    fn user_account() -> EntityType {
        EntityType::new(
            "user_account",
            "id",
            "master",
            Dialect::MySql,
            vec![
                ColumnMeta::new("id", "bigint", false, true),
                ColumnMeta::new("name", "varchar(64)", true, false),
                ColumnMeta::new("email", "varchar(64)", true, false),
            ],
        )
    }

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fuzzy_single_column() {
        let p = compile_map(&user_account(), &map(json!({"name": "john", "isOr": false})), MatchMode::Fuzzy);
        assert_eq!(p.clause, " 1 AND( NAME like ? )");
        assert_eq!(p.params, vec![json!("%john%")]);
    }

    #[test]
    fn exact_keeps_value_and_joins_with_or() {
        let p = compile_map(
            &user_account(),
            &map(json!({"EMAIL": "a@b.c", "Name": "abc", "isOr": "true", "unknown": 1})),
            MatchMode::Exact,
        );
        assert_eq!(p.clause, " 1 AND( NAME = ? OR EMAIL = ? )");
        assert_eq!(p.params, vec![json!("abc"), json!("a@b.c")]);
    }

    #[test]
    fn nothing_participates() {
        let p = compile_map(&user_account(), &map(json!({"name": "", "email": null, "age": 3})), MatchMode::Fuzzy);
        assert_eq!(p.clause, "1");
        assert!(p.params.is_empty());
    }

    #[test]
    fn unknown_keys_never_reach_the_clause() {
        let p = compile_map(&user_account(), &map(json!({"password": "x", "id": 4})), MatchMode::Exact);
        assert!(!p.clause.contains("PASSWORD"));
        assert_eq!(p.clause, " 1 AND( ID = ? )");
    }

    #[test]
    fn de_layer_merges_input() {
        let m = de_layer(map(json!({"name": "top", "input": "{\"name\":\"inner\",\"email\":\"e\"}"}))).unwrap();
        assert_eq!(m.get("name"), Some(&json!("top")));
        assert_eq!(m.get("email"), Some(&json!("e")));
        assert!(!m.contains_key("input"));
        assert!(de_layer(map(json!({"input": "[1]"}))).is_err());
    }

    #[test]
    fn page_request_defaults_and_order() {
        let e = user_account();
        let r = PageRequest::from_map(&e, &map(json!({}))).unwrap();
        assert_eq!((r.page_num, r.page_size, r.order_by.as_str()), (1, 10, ""));
        let r = PageRequest::from_map(&e, &map(json!({"pageNum": "2", "pageSize": 5, "sort": "name,id", "order": "desc"})))
            .unwrap();
        assert_eq!((r.page_num, r.page_size), (2, 5));
        assert_eq!(r.order_by, "NAME DESC, ID ASC");
        assert!(PageRequest::from_map(&e, &map(json!({"sort": "nope"}))).is_err());
        assert!(PageRequest::from_map(&e, &map(json!({"pageSize": -1}))).is_err());
    }
}
