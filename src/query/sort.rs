//! Ordering: `{property, direction}` pairs checked against the entity's columns.

use crate::error::AppError;
use crate::model::EntityType;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters allowed in an ordering property.
const PROPERTY_PATTERN: &str = r"^[A-Za-z0-9_\-+.]+$";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

impl std::str::FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(AppError::Validation(format!(
                "invalid sort direction: {} (expected ASC or DESC)",
                s
            ))),
        }
    }
}

impl Direction {
    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSort {
    pub property: String,
    #[serde(default)]
    pub direction: Direction,
}

impl FieldSort {
    pub fn new(property: &str, direction: Direction) -> Self {
        FieldSort {
            property: property.to_string(),
            direction,
        }
    }

    /// `COLUMN DIR`. Rejects properties with characters outside the identifier set and
    /// properties that are not columns of `entity`.
    pub fn to_expression(&self, entity: &EntityType) -> Result<String, AppError> {
        let re = Regex::new(PROPERTY_PATTERN)
            .map_err(|e| AppError::Validation(format!("invalid property pattern: {}", e)))?;
        if !re.is_match(&self.property) {
            tracing::warn!(property = %self.property, "rejected ordering property");
            return Err(AppError::Validation(format!(
                "invalid ordering property: {}",
                self.property
            )));
        }
        let column = entity.column(&self.property).ok_or_else(|| {
            AppError::Validation(format!(
                "ordering property '{}' is not a column of {}",
                self.property, entity.table
            ))
        })?;
        Ok(format!("{} {}", column.name, self.direction.sql()))
    }
}

/// Parse aligned comma-separated `sort` and `order` lists ("name,age" / "desc,asc").
/// A missing direction defaults to ASC.
pub fn parse_sort(sort: &str, order: Option<&str>) -> Result<Vec<FieldSort>, AppError> {
    let directions: Vec<&str> = order.map(|o| o.split(',').collect()).unwrap_or_default();
    sort.split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, p)| !p.is_empty())
        .map(|(i, p)| -> Result<FieldSort, AppError> {
            let direction: Direction = directions.get(i).copied().unwrap_or("").parse()?;
            Ok(FieldSort::new(p, direction))
        })
        .collect()
}

/// ORDER BY expression for `sorts`, empty when there are none.
pub fn order_by_clause(sorts: &[FieldSort], entity: &EntityType) -> Result<String, AppError> {
    let parts = sorts
        .iter()
        .map(|s| s.to_expression(entity))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnMeta;
    use crate::sql::Dialect;

    fn entity() -> EntityType {
        EntityType::new(
            "users",
            "id",
            "master",
            Dialect::Sqlite,
            vec![ColumnMeta::new("name", "TEXT", true, false), ColumnMeta::new("age", "INTEGER", true, false)],
        )
    }

    #[test]
    fn parses_aligned_lists() {
        let sorts = parse_sort("name, age", Some("desc")).unwrap();
        assert_eq!(sorts, vec![FieldSort::new("name", Direction::Desc), FieldSort::new("age", Direction::Asc)]);
        assert_eq!(order_by_clause(&sorts, &entity()).unwrap(), "NAME DESC, AGE ASC");
        assert!(parse_sort("name", Some("sideways")).is_err());
    }

    #[test]
    fn rejects_injection_and_unknown_columns() {
        let e = entity();
        assert!(FieldSort::new("name; DROP TABLE users", Direction::Asc).to_expression(&e).is_err());
        assert!(FieldSort::new("salary", Direction::Asc).to_expression(&e).is_err());
        assert_eq!(order_by_clause(&[], &e).unwrap(), "");
    }

    #[test]
    fn direction_from_json() {
        let s: FieldSort = serde_json::from_str(r#"{"property":"age","direction":"desc"}"#).unwrap();
        assert_eq!(s.direction, Direction::Desc);
        let s: FieldSort = serde_json::from_str(r#"{"property":"age"}"#).unwrap();
        assert_eq!(s.direction, Direction::Asc);
    }
}
