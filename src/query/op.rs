//! Filter operators and the shape of value each one takes.

use serde::{Deserialize, Serialize};

/// Operator of one structured filter predicate. Deserializes from the long name
/// (`NOT_EQUAL`) or the short code (`NE`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOp {
    #[default]
    #[serde(alias = "EQ")]
    Equal,
    #[serde(alias = "NE")]
    NotEqual,
    #[serde(alias = "LT")]
    Less,
    #[serde(alias = "LE")]
    LessEqual,
    #[serde(alias = "GT")]
    Great,
    #[serde(alias = "GE")]
    GreatEqual,
    #[serde(alias = "LK")]
    Like,
    NotLike,
    #[serde(alias = "LFK")]
    LeftLike,
    NotLeftLike,
    #[serde(alias = "RHK")]
    RightLike,
    NotRightLike,
    #[serde(alias = "ISNULL")]
    IsNull,
    #[serde(alias = "NOTNULL")]
    NotNull,
    #[serde(alias = "ISEMPTY")]
    IsEmpty,
    #[serde(alias = "NOTEMPTY")]
    NotEmpty,
    In,
    NotIn,
    Between,
    NotBetween,
    #[serde(alias = "EIC")]
    EqualIgnoreCase,
    Regexp,
}

/// What value an operator takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// No value: null and empty-string checks.
    Nullary,
    Scalar,
    /// A list of 1..=1000 values.
    List,
    /// Exactly two values.
    Range,
}

/// Where a LIKE operator puts its wildcard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wildcard {
    Both,
    Leading,
    Trailing,
}

impl QueryOp {
    /// Long name, as serialized.
    pub fn name(&self) -> &'static str {
        match self {
            QueryOp::Equal => "EQUAL",
            QueryOp::NotEqual => "NOT_EQUAL",
            QueryOp::Less => "LESS",
            QueryOp::LessEqual => "LESS_EQUAL",
            QueryOp::Great => "GREAT",
            QueryOp::GreatEqual => "GREAT_EQUAL",
            QueryOp::Like => "LIKE",
            QueryOp::NotLike => "NOT_LIKE",
            QueryOp::LeftLike => "LEFT_LIKE",
            QueryOp::NotLeftLike => "NOT_LEFT_LIKE",
            QueryOp::RightLike => "RIGHT_LIKE",
            QueryOp::NotRightLike => "NOT_RIGHT_LIKE",
            QueryOp::IsNull => "IS_NULL",
            QueryOp::NotNull => "NOT_NULL",
            QueryOp::IsEmpty => "IS_EMPTY",
            QueryOp::NotEmpty => "NOT_EMPTY",
            QueryOp::In => "IN",
            QueryOp::NotIn => "NOT_IN",
            QueryOp::Between => "BETWEEN",
            QueryOp::NotBetween => "NOT_BETWEEN",
            QueryOp::EqualIgnoreCase => "EQUAL_IGNORE_CASE",
            QueryOp::Regexp => "REGEXP",
        }
    }

    /// SQL operator text.
    pub fn sql(&self) -> &'static str {
        match self {
            QueryOp::Equal | QueryOp::EqualIgnoreCase => "=",
            QueryOp::NotEqual => "!=",
            QueryOp::Less => "<",
            QueryOp::LessEqual => "<=",
            QueryOp::Great => ">",
            QueryOp::GreatEqual => ">=",
            QueryOp::Like | QueryOp::LeftLike | QueryOp::RightLike => "like",
            QueryOp::NotLike | QueryOp::NotLeftLike | QueryOp::NotRightLike => "not like",
            QueryOp::IsNull => "is null",
            QueryOp::NotNull => "is not null",
            QueryOp::IsEmpty => "= ''",
            QueryOp::NotEmpty => "!= ''",
            QueryOp::In => "in",
            QueryOp::NotIn => "not in",
            QueryOp::Between => "between",
            QueryOp::NotBetween => "not between",
            QueryOp::Regexp => "REGEXP",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            QueryOp::IsNull | QueryOp::NotNull | QueryOp::IsEmpty | QueryOp::NotEmpty => Arity::Nullary,
            QueryOp::In | QueryOp::NotIn => Arity::List,
            QueryOp::Between | QueryOp::NotBetween => Arity::Range,
            _ => Arity::Scalar,
        }
    }

    pub fn wildcard(&self) -> Option<Wildcard> {
        match self {
            QueryOp::Like | QueryOp::NotLike => Some(Wildcard::Both),
            QueryOp::LeftLike | QueryOp::NotLeftLike => Some(Wildcard::Leading),
            QueryOp::RightLike | QueryOp::NotRightLike => Some(Wildcard::Trailing),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_long_names_and_codes() {
        let ops: Vec<QueryOp> =
            serde_json::from_str(r#"["NOT_IN","NE","EIC","ISNULL","LFK","GREAT_EQUAL"]"#).unwrap();
        assert_eq!(
            ops,
            vec![
                QueryOp::NotIn,
                QueryOp::NotEqual,
                QueryOp::EqualIgnoreCase,
                QueryOp::IsNull,
                QueryOp::LeftLike,
                QueryOp::GreatEqual
            ]
        );
        assert_eq!(serde_json::to_string(&QueryOp::NotRightLike).unwrap(), "\"NOT_RIGHT_LIKE\"");
        assert!(serde_json::from_str::<QueryOp>("\"SOUNDS_LIKE\"").is_err());
    }

    #[test]
    fn arity_by_operator() {
        assert_eq!(QueryOp::Between.arity(), Arity::Range);
        assert_eq!(QueryOp::NotIn.arity(), Arity::List);
        assert_eq!(QueryOp::NotEmpty.arity(), Arity::Nullary);
        assert_eq!(QueryOp::Regexp.arity(), Arity::Scalar);
        assert_eq!(QueryOp::RightLike.wildcard(), Some(Wildcard::Trailing));
    }
}
