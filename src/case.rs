//! Identifier case conversion: table names to type names, column names to view-object fields.

use serde_json::{Map, Value};

/// Convert a table name to its synthesized type name.
/// e.g. "user_account" -> "UserAccount", "ORDER_ITEM" -> "OrderItem"
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_by" -> "createdBy"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdBy" -> "created_by"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Column identifier for a view-object field or map key: "userId" and "user_id" both give "USER_ID".
pub fn to_column_name(s: &str) -> String {
    if s.chars().any(|c| c.is_lowercase()) {
        to_snake_case(s).to_uppercase()
    } else {
        s.to_string()
    }
}

/// Convert all keys of a JSON object from snake_case to camelCase (in place).
pub fn object_keys_to_camel_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let camel = to_camel_case(&k);
        if camel != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(camel, v);
            }
        }
    }
}
