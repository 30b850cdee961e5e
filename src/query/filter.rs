//! Structured filter payload: paging, ordering, projection and AND-ed groups of predicates.

use crate::error::AppError;
use crate::keys;
use crate::model::EntityType;
use crate::query::field::QueryField;
use crate::query::op::QueryOp;
use crate::query::sort::{order_by_clause, FieldSort};
use crate::query::Predicate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(default = "default_page_num")]
    pub page_num: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub sorter: Vec<FieldSort>,
    /// Projection. Unknown names are dropped; empty selects every column.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Groups are AND-ed together. A null entry matches everything.
    #[serde(default, alias = "query")]
    pub querys: Vec<Vec<Option<QueryField>>>,
    /// AND the predicates within a group instead of OR-ing them.
    #[serde(default)]
    pub match_all: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        QueryFilter {
            page_num: default_page_num(),
            page_size: default_page_size(),
            sorter: Vec::new(),
            columns: Vec::new(),
            querys: Vec::new(),
            match_all: false,
        }
    }
}

impl QueryFilter {
    /// `1 and ( a or b ) and ( c ) and 1 `. Every field must name a column of `entity` and
    /// every value must suit its operator; nothing is compiled otherwise.
    pub fn compile(&self, entity: &EntityType) -> Result<Predicate, AppError> {
        let mut params = Vec::new();
        let joiner = if self.match_all { " and " } else { " or " };
        let mut groups = Vec::with_capacity(self.querys.len());
        for group in self.querys.iter().filter(|g| !g.is_empty()) {
            let mut exprs = Vec::with_capacity(group.len());
            for field in group {
                let Some(field) = field else {
                    exprs.push(keys::WHERE_ALL.to_string());
                    continue;
                };
                let column = entity.column(&field.name).ok_or_else(|| {
                    AppError::Validation(format!(
                        "field '{}' is not a column of {}",
                        field.name, entity.table
                    ))
                })?;
                field.validate()?;
                if field.operation == QueryOp::Regexp && !entity.dialect.supports_regexp() {
                    return Err(AppError::Validation(format!(
                        "field '{}': operator {} is not supported on {}",
                        field.name,
                        field.operation,
                        entity.dialect.name()
                    )));
                }
                params.extend(field.bind_values());
                exprs.push(field.to_expression(&column.name));
            }
            groups.push(format!("and ( {} )", exprs.join(joiner)));
        }
        Ok(Predicate {
            clause: format!("1 {} and 1 ", groups.join(" ")),
            params,
        })
    }

    pub fn order_by(&self, entity: &EntityType) -> Result<String, AppError> {
        order_by_clause(&self.sorter, entity)
    }

    /// Requested columns that exist on `entity`, in their canonical form.
    pub fn select_columns(&self, entity: &EntityType) -> Vec<String> {
        self.columns
            .iter()
            .filter_map(|c| entity.column(c).map(|m| m.name.clone()))
            .collect()
    }
}

fn default_page_num() -> u64 {
    keys::DEFAULT_PAGE_NUM
}

fn default_page_size() -> u64 {
    keys::DEFAULT_PAGE_SIZE
}
