//! Filter compilation: flat maps and structured filter groups to parameterized WHERE clauses.

pub mod field;
pub mod filter;
pub mod op;
pub mod simple;
pub mod sort;

pub use field::QueryField;
pub use filter::QueryFilter;
pub use op::{Arity, QueryOp};
pub use simple::{compile_map, de_layer, is_or, MatchMode, PageRequest};
pub use sort::{order_by_clause, parse_sort, Direction, FieldSort};

use crate::keys;
use serde_json::Value;

/// A WHERE clause and its bind values, one per `?` in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<Value>,
}

impl Predicate {
    /// Matches every row.
    pub fn all() -> Self {
        Predicate {
            clause: keys::WHERE_ALL.to_string(),
            params: Vec::new(),
        }
    }

    pub fn new(clause: impl Into<String>, params: Vec<Value>) -> Self {
        Predicate {
            clause: clause.into(),
            params,
        }
    }
}
