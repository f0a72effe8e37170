//! The combinator AST (spec §3.2) and its builder API (spec §4.B).
//!
//! `Node` is the bare, un-annotated composition tree — what gets nested
//! inside `if`/`try`/`let`/etc bodies. `Composition` pairs a `Node` with
//! the attached-actions map that must be deployed alongside it (spec §3.2
//! "A composition carries an optional attached actions list"). Only
//! `Composition` is exposed to callers; `Node` is what survives once a
//! child composition's attachments have been merged into its parent's
//! (spec §4.B "Attached-action propagation").

mod build_error;
mod combinators;
mod merge;
mod serialize;

pub use build_error::BuildError;
pub use serialize::Serialized;

use composer_core::Json;
use composer_fsm::{Exec, ExecKind};
use indexmap::IndexMap;

/// A attached, deployable action record (spec §3.2, §6.1).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttachedAction {
    pub name: String,
    pub action: AttachedActionBody,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttachedActionBody {
    pub exec: Exec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

/// A `{key, value}` annotation record (spec §6.1 — carries the `conductor`
/// annotation on deployed compositions).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: Json,
}

/// Options shared by `if`/`while`/`dowhile` (spec §3.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConditionalOptions {
    #[serde(default)]
    pub nosave: bool,
}

/// Options for `retain` (spec §3.2).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetainOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub catch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Box<Node>>,
}

/// The bare composition tree, without its attached-actions side table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Action {
        name: String,
    },
    Function {
        exec: Exec,
    },
    Literal {
        value: Json,
    },
    Sequence {
        children: Vec<Node>,
    },
    If {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
        #[serde(default)]
        options: ConditionalOptions,
    },
    While {
        test: Box<Node>,
        body: Box<Node>,
        #[serde(default)]
        options: ConditionalOptions,
    },
    DoWhile {
        body: Box<Node>,
        test: Box<Node>,
        #[serde(default)]
        options: ConditionalOptions,
    },
    Try {
        body: Box<Node>,
        handler: Box<Node>,
    },
    Finally {
        body: Box<Node>,
        finalizer: Box<Node>,
    },
    Let {
        declarations: IndexMap<String, Json>,
        body: Box<Node>,
    },
    Retain {
        body: Box<Node>,
        #[serde(default)]
        options: RetainOptions,
    },
}

impl Node {
    pub fn action(name: impl Into<String>) -> Self {
        Node::Action { name: name.into() }
    }

    pub fn literal(value: Json) -> Self {
        Node::Literal { value }
    }

    pub fn function_source(code: impl Into<String>) -> Self {
        Node::Function {
            exec: Exec {
                kind: ExecKind::Source,
                code: code.into(),
            },
        }
    }
}

/// A composition: a node tree plus the attached actions it must deploy
/// alongside (spec §3.2). Invariant: no two attached actions share a name
/// (checked globally on every merge — see `merge::merge_attached`, which
/// resolves spec §9's second open question in favor of the stricter,
/// globally-unique behavior).
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub node: Node,
    pub attached: IndexMap<String, AttachedAction>,
}

impl Composition {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            attached: IndexMap::new(),
        }
    }

    pub fn with_attached(node: Node, attached: IndexMap<String, AttachedAction>) -> Self {
        Self { node, attached }
    }
}

pub use combinators::{
    TaskInput, action, dowhile, finally, function, if_, let_, literal, named, repeat, retain,
    retry, seq, sequence, task, try_, value, while_,
};
pub use merge::merge_all;
