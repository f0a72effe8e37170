//! Errors raised while stepping a composition.

/// A failure the conductor's own machinery detects, as opposed to a
/// business-logic error carried as data on `params.error`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// The `$resume` field on input params was malformed (HTTP 400).
    #[error("malformed resume token: {0}")]
    BadResume(String),
    /// The compiled program or stack was in a state the conductor cannot
    /// step: an unrecognized instruction, `exit`/`pop` on an empty stack,
    /// or a jump landing outside the program (HTTP 500).
    #[error("internal conductor error: {0}")]
    InternalError(String),
}

impl RuntimeError {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            RuntimeError::BadResume(_) => 400,
            RuntimeError::InternalError(_) => 500,
        }
    }
}

/// Coerce any JSON value thrown during execution into a `{code, error}`
/// document. `code` defaults to 500; the error string falls back through
/// `.error`, `.message`, the value itself, or a generic message.
pub fn encode_error(value: &composer_core::Json) -> serde_json::Value {
    let code = value
        .get("code")
        .and_then(|c| c.as_u64())
        .unwrap_or(500);

    let error = value
        .get("error")
        .and_then(|e| e.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "unknown error".to_string(),
            other => other.to_string(),
        });

    serde_json::json!({ "code": code, "error": error })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_prefers_error_field() {
        let out = encode_error(&serde_json::json!({"error": "boom", "code": 403}));
        assert_eq!(out, serde_json::json!({"code": 403, "error": "boom"}));
    }

    #[test]
    fn encode_error_falls_back_to_message() {
        let out = encode_error(&serde_json::json!({"message": "nope"}));
        assert_eq!(out, serde_json::json!({"code": 500, "error": "nope"}));
    }

    #[test]
    fn encode_error_falls_back_to_string_value() {
        let out = encode_error(&serde_json::json!("plain string"));
        assert_eq!(out, serde_json::json!({"code": 500, "error": "plain string"}));
    }

    #[test]
    fn encode_error_generic_fallback() {
        let out = encode_error(&serde_json::Value::Null);
        assert_eq!(out, serde_json::json!({"code": 500, "error": "unknown error"}));
    }
}
