//! The serialized composition document (spec §6.1).
//!
//! This is what `compose.json`/`--encode` output looks like: the bare
//! node tree plus its flattened attached-actions table, both JSON-ready.

use indexmap::IndexMap;

use super::{AttachedAction, Composition, Node};

/// A composition ready to write to disk or hand to a deploy step.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Serialized {
    pub composition: Node,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<String, AttachedAction>,
}

impl From<Composition> for Serialized {
    fn from(composition: Composition) -> Self {
        Self {
            composition: composition.node,
            actions: composition.attached,
        }
    }
}

impl Serialized {
    pub fn into_composition(self) -> Composition {
        Composition::with_attached(self.composition, self.actions)
    }
}
