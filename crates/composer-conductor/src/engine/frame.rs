//! The conductor's explicit call stack.
//!
//! A frame is exactly one of three kinds. Environment lookup walks the
//! stack top-down looking only at `Let` frames; `exit`/`pop` act on
//! whatever sits on top regardless of kind.

use composer_core::Json;
use indexmap::IndexMap;

/// One entry on the conductor's frame stack.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Frame {
    /// Pushed by `try`; `exit` pops it on the success path.
    Catch { catch: usize },
    /// Pushed by `let`; holds the deep-copied declarations for this scope.
    Let {
        #[serde(rename = "let")]
        declarations: IndexMap<String, Json>,
    },
    /// Pushed by `push`; holds a snapshot `pop` later merges back in.
    Save { params: Json },
}
