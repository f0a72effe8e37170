//! Turn every `composition`-kind attachment into a deployable conductor
//! document — the compiled FSM the conductor steps, with the original
//! tree preserved as a `conductor` annotation so the composition can be
//! recovered later.

use composer_compiler::ast::{Annotation, AttachedAction};
use composer_compiler::{BuildError, Composition, Node, compile};
use composer_fsm::{Exec, ExecKind};

/// Errors specific to `encode`, on top of the builder's own `CannotEncode`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Build(#[from] BuildError),
    /// An attachment tagged `kind: composition` didn't carry a valid
    /// serialized `Node` in its `code` field.
    #[error("attached action {0:?} carries a malformed composition payload: {1}")]
    MalformedPayload(String, String),
}

/// Names `composition` under `name` first if given; otherwise the
/// composition must already be a single named action (the shape `named`
/// produces), or this fails with `CannotEncode`. Every attachment whose
/// `exec.kind` is `composition` is then replaced, in place, by its
/// compiled, deployable form.
pub fn encode(composition: Composition, name: Option<&str>) -> Result<Composition, EncodeError> {
    let composition = match name {
        Some(n) => composer_compiler::named(composition, n)?,
        None => composition,
    };

    if !matches!(composition.node, Node::Action { .. }) {
        return Err(BuildError::CannotEncode.into());
    }

    let mut attached = composition.attached;
    for action in attached.values_mut() {
        encode_attachment(action)?;
    }

    Ok(Composition::with_attached(composition.node, attached))
}

fn encode_attachment(action: &mut AttachedAction) -> Result<(), EncodeError> {
    if action.action.exec.kind != ExecKind::Composition {
        return Ok(());
    }

    let tree: Node = serde_json::from_str(&action.action.exec.code)
        .map_err(|e| EncodeError::MalformedPayload(action.name.clone(), e.to_string()))?;
    let program = compile(&tree, "");
    let code = serde_json::to_string(&program).expect("Program always serializes");

    action.action.exec = Exec {
        kind: ExecKind::Conductor,
        code,
    };
    action
        .action
        .annotations
        .get_or_insert_with(Vec::new)
        .push(Annotation {
            key: "conductor".to_string(),
            value: serde_json::to_value(&tree).expect("Node always serializes"),
        });
    Ok(())
}
