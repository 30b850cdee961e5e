//! Per-backend SQL details: identifier quoting, literal escaping, column casts.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Backend from a connection url scheme. `None` for unsupported schemes.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Whether `REGEXP` is built in. SQLite only has it when an extension registers one.
    pub fn supports_regexp(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Quote an identifier. Both backends accept backticks.
    pub fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    /// Inline literal for statements executed without bind parameters.
    pub fn literal(&self, v: &Value) -> String {
        match v {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => self.quote_string(s),
            Value::Array(_) | Value::Object(_) => self.quote_string(&v.to_string()),
        }
    }

    fn quote_string(&self, s: &str) -> String {
        let escaped = match self {
            Dialect::MySql => s.replace('\\', "\\\\").replace('\'', "''"),
            Dialect::Sqlite => s.replace('\'', "''"),
        };
        format!("'{}'", escaped)
    }

    /// SELECT expression for a column. Types the `Any` driver cannot decode are cast to text
    /// (or to a signed integer for unsigned MySQL integers) and aliased back to the column name.
    pub fn select_expr(&self, column: &str, sql_type: &str) -> String {
        let q = self.quote(column);
        match self.cast_for(sql_type) {
            Some(target) => format!("CAST({} AS {}) AS {}", q, target, q),
            None => q,
        }
    }

    fn cast_for(&self, sql_type: &str) -> Option<&'static str> {
        let t = sql_type.to_ascii_lowercase();
        match self {
            Dialect::MySql => {
                if t.contains("int") {
                    if t.contains("unsigned") {
                        Some("SIGNED")
                    } else {
                        None
                    }
                } else if ["char", "text", "blob", "binary", "float", "double", "real", "bool"]
                    .iter()
                    .any(|n| t.contains(n))
                {
                    None
                } else {
                    Some("CHAR")
                }
            }
            Dialect::Sqlite => {
                if t.is_empty()
                    || ["int", "char", "clob", "text", "blob", "real", "floa", "doub", "bool"]
                        .iter()
                        .any(|n| t.contains(n))
                {
                    None
                } else {
                    Some("TEXT")
                }
            }
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
