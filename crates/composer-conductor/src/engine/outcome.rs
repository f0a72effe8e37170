//! The conductor's per-invocation result.
//!
//! Deliberately hand-rolled rather than `#[serde(untagged)]`: the three
//! shapes overlap too much (`Failure` is a bare error object, `Success`
//! wraps `params` under a key) for untagged matching to pick the right
//! one reliably, and the host contract cares about exact field layout.

use composer_core::Json;
use serde::Serialize;

/// What a single host invocation produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Terminal, no error field on params: `{params}`.
    Success { params: Json },
    /// Terminal, params carries an error field: the error object itself,
    /// not wrapped: the error object itself, with its own `error` field.
    Failure { error: Json },
    /// Not terminal: the host must invoke `action` and re-enter with the
    /// result merged into `state`.
    Suspend {
        action: String,
        params: Json,
        resume_state: Option<usize>,
        resume_stack: Json,
    },
}

impl Serialize for Outcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            Outcome::Success { params } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("params", params)?;
                map.end()
            }
            Outcome::Failure { error } => error.serialize(serializer),
            Outcome::Suspend {
                action,
                params,
                resume_state,
                resume_stack,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("action", action)?;
                map.serialize_entry("params", params)?;
                map.serialize_entry(
                    "state",
                    &serde_json::json!({ "$resume": { "state": resume_state, "stack": resume_stack } }),
                )?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_wrapped_in_params() {
        let outcome = Outcome::Success {
            params: serde_json::json!(42),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, serde_json::json!({"params": 42}));
    }

    #[test]
    fn failure_serializes_as_the_bare_error_object() {
        let outcome = Outcome::Failure {
            error: serde_json::json!({"error": "bang"}),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, serde_json::json!({"error": "bang"}));
    }

    #[test]
    fn suspend_carries_a_resume_token() {
        let outcome = Outcome::Suspend {
            action: "/_/echo".to_string(),
            params: serde_json::json!({}),
            resume_state: Some(3),
            resume_stack: serde_json::json!([]),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["action"], serde_json::json!("/_/echo"));
        assert_eq!(value["state"]["$resume"]["state"], serde_json::json!(3));
    }
}
