//! Attached-action merge (spec §4.B "Attached-action propagation").
//!
//! Spec §9's second open question notes that checking uniqueness only at
//! the `named()` boundary misses duplicates arriving from independent
//! subtrees that were each individually valid, and recommends enforcing
//! uniqueness globally. We take that recommendation (DESIGN.md): every
//! merge, not just `named()`, goes through `merge_all`/`merge_into`, so a
//! clash is always caught at the point two subtrees are first combined.

use super::{AttachedAction, BuildError, Composition, Node};
use indexmap::IndexMap;

/// Merge `from` into `into`, erroring if any name collides.
pub fn merge_into(
    into: &mut IndexMap<String, AttachedAction>,
    from: IndexMap<String, AttachedAction>,
) -> Result<(), BuildError> {
    for (name, action) in from {
        if into.insert(name.clone(), action).is_some() {
            return Err(BuildError::DuplicateAction(name));
        }
    }
    Ok(())
}

/// Merge every child composition's attachments into one map and return the
/// bare node trees in order, for combinators (`sequence`, `if`, ...) that
/// take several `Composition` children and emit one node with several
/// `Node` sub-trees.
pub fn merge_all(children: Vec<Composition>) -> Result<(Vec<Node>, IndexMap<String, AttachedAction>), BuildError> {
    let mut attached = IndexMap::new();
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        merge_into(&mut attached, child.attached)?;
        nodes.push(child.node);
    }
    Ok((nodes, attached))
}
