//! One structured predicate: field, operator, value.

use crate::error::AppError;
use crate::keys;
use crate::query::op::{Arity, QueryOp, Wildcard};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryField {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub operation: QueryOp,
}

impl QueryField {
    pub fn new(name: &str, operation: QueryOp, value: Value) -> Self {
        QueryField {
            name: name.to_string(),
            value,
            operation,
        }
    }

    /// Check the value against the operator before any SQL is built.
    pub fn validate(&self) -> Result<(), AppError> {
        let op = self.operation;
        let fail = |what: &str| {
            Err(AppError::Validation(format!(
                "field '{}': operator {} {}, got {}",
                self.name, op, what, self.value
            )))
        };
        match (op.arity(), &self.value) {
            (_, Value::Object(_)) => fail("does not accept an object value"),
            (Arity::Nullary, Value::Null) => Ok(()),
            (Arity::Nullary, _) => fail("takes no value"),
            (Arity::Scalar, Value::Array(_)) => fail("does not accept a list value"),
            (Arity::Scalar, Value::Null) => fail("requires a value"),
            (Arity::Scalar, _) => Ok(()),
            (Arity::List, Value::Array(items)) => {
                if items.is_empty() || items.len() > keys::MAX_IN_LIST {
                    fail("requires a list of 1 to 1000 values")
                } else if items.iter().any(|v| v.is_array() || v.is_object()) {
                    fail("requires a list of scalar values")
                } else {
                    Ok(())
                }
            }
            (Arity::Range, Value::Array(items)) => {
                if items.len() != 2 {
                    fail("requires a list of exactly 2 values")
                } else if items.iter().any(|v| v.is_array() || v.is_object()) {
                    fail("requires a list of scalar values")
                } else {
                    Ok(())
                }
            }
            (Arity::List, _) | (Arity::Range, _) => fail("requires a list value"),
        }
    }

    /// Values bound by this predicate, in placeholder order. LIKE values get their
    /// wildcard unless it is already present at that end.
    pub fn bind_values(&self) -> Vec<Value> {
        match (self.operation.arity(), &self.value) {
            (Arity::Nullary, _) => Vec::new(),
            (_, Value::Array(items)) => items.clone(),
            (_, Value::String(s)) if !s.is_empty() => match self.operation.wildcard() {
                Some(w) => vec![Value::String(wrap_like(s, w))],
                None => vec![self.value.clone()],
            },
            _ => vec![self.value.clone()],
        }
    }

    /// SQL text of the predicate for `column`.
    pub fn to_expression(&self, column: &str) -> String {
        let op = self.operation;
        match op {
            QueryOp::In | QueryOp::NotIn => {
                let n = self.value.as_array().map(|a| a.len()).unwrap_or(0);
                let holders = vec!["?"; n].join(",");
                format!("{} {} ({})", column, op.sql(), holders)
            }
            QueryOp::Between => format!("{} between ? and ?", column),
            QueryOp::NotBetween => format!("{} not between ? and ?", column),
            QueryOp::EqualIgnoreCase => format!("upper({}) {} upper(?)", column, op.sql()),
            _ if op.arity() == Arity::Nullary => format!("{} {}", column, op.sql()),
            _ => format!("{} {} ?", column, op.sql()),
        }
    }
}

fn wrap_like(s: &str, w: Wildcard) -> String {
    let pct = keys::LIKE_WILDCARD;
    let starts = s.starts_with(pct);
    let ends = s.ends_with(pct);
    match w {
        Wildcard::Both if !starts && !ends => format!("{}{}{}", pct, s, pct),
        Wildcard::Leading if !starts => format!("{}{}", pct, s),
        Wildcard::Trailing if !ends => format!("{}{}", s, pct),
        _ => s.to_string(),
    }
}
