//! Standard `{code, message, data}` response envelope.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric result codes carried by the envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    ObjectExists,
    ObjectNotExists,
    ObjectInUsing,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::ObjectExists => -1,
            ErrorCode::ObjectNotExists => -2,
            ErrorCode::ObjectInUsing => -3,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::ObjectExists => "object exists",
            ErrorCode::ObjectNotExists => "object not exists",
            ErrorCode::ObjectInUsing => "object in-using",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope::with_code(ErrorCode::Success, Some(data))
    }

    pub fn not_exists() -> Self {
        Envelope::with_code(ErrorCode::ObjectNotExists, None)
    }

    pub fn with_code(code: ErrorCode, data: Option<T>) -> Self {
        Envelope {
            code: code.code(),
            message: code.message().to_string(),
            data,
        }
    }

    /// Success for `Some`, not-exists for `None`.
    pub fn from_option(data: Option<T>) -> Self {
        match data {
            Some(d) => Envelope::success(d),
            None => Envelope::not_exists(),
        }
    }
}

impl<T> Envelope<Vec<T>> {
    /// Success for a non-empty list, not-exists for an empty one.
    pub fn from_list(data: Vec<T>) -> Self {
        if data.is_empty() {
            Envelope::not_exists()
        } else {
            Envelope::success(data)
        }
    }
}

impl Envelope<Value> {
    /// Missing rows map to not-exists and version conflicts to in-using; anything else keeps
    /// its message under code 1 with the error's string code as data.
    pub fn from_error(err: &AppError) -> Self {
        if err.is_not_found() {
            return Envelope {
                code: ErrorCode::ObjectNotExists.code(),
                message: err.to_string(),
                data: None,
            };
        }
        if let AppError::StaleRecord { .. } = err {
            return Envelope {
                code: ErrorCode::ObjectInUsing.code(),
                message: err.to_string(),
                data: None,
            };
        }
        Envelope {
            code: 1,
            message: err.to_string(),
            data: Some(Value::String(err.code().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_serialize_with_code_message_data() {
        let ok = Envelope::success(json!({"id": 1}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"code": 0, "message": "success", "data": {"id": 1}})
        );
        let missing: Envelope<Vec<i32>> = Envelope::from_list(vec![]);
        assert_eq!((missing.code, missing.message.as_str()), (-2, "object not exists"));
    }

    #[test]
    fn errors_map_to_codes() {
        let e = Envelope::from_error(&AppError::NotFound("object not exists".into()));
        assert_eq!(e.code, -2);
        let e = Envelope::from_error(&AppError::StaleRecord {
            table: "t".into(),
            id: "1".into(),
        });
        assert_eq!(e.code, -3);
        let e = Envelope::from_error(&AppError::Validation("bad".into()));
        assert_eq!(e.code, 1);
        assert_eq!(e.data, Some(json!("validation_error")));
    }
}
