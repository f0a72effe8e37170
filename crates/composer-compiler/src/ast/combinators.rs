//! The convenience combinator API (spec §4.B).
//!
//! Every combinator here lowers to the primitives declared on `Node`/
//! `Composition`. Several validation rules the dynamic source language
//! enforces at runtime (`literal` rejects functions, `let` rejects
//! non-object declarations) are instead enforced by the Rust type system
//! here: a `composer_core::Json` can't hold a function, and `declarations`
//! is typed as `IndexMap<String, Json>` rather than an arbitrary value.

use composer_core::Json;
use composer_fsm::{Exec, ExecKind};
use indexmap::IndexMap;

use super::merge::merge_all;
use super::{AttachedAction, AttachedActionBody, BuildError, Composition, ConditionalOptions, Node, RetainOptions};

/// Input accepted by `task` (spec §4.B): `task` coerces whatever a caller
/// hands it into a `Composition`.
pub enum TaskInput {
    /// `null` — coerces to an empty sequence.
    Empty,
    /// An existing composition, passed through unchanged.
    Composition(Composition),
    /// A bare action name string.
    ActionName(String),
    /// Inline source, lowered to a `function` node.
    Source(String),
}

/// `task(x)` — coerce `x` into a composition (spec §4.B).
pub fn task(input: TaskInput) -> Result<Composition, BuildError> {
    match input {
        TaskInput::Empty => sequence(Vec::new()),
        TaskInput::Composition(c) => Ok(c),
        TaskInput::ActionName(name) => action(&name),
        TaskInput::Source(code) => Ok(function(code)),
    }
}

/// `action{name}` — invoke a named action.
pub fn action(name: &str) -> Result<Composition, BuildError> {
    let canonical = composer_core::canonicalize(name)?;
    Ok(Composition::new(Node::action(canonical)))
}

/// `function{exec{kind:"source",code}}` — evaluate inline source.
pub fn function(code: impl Into<String>) -> Composition {
    Composition::new(Node::function_source(code))
}

/// `literal{value}` — replace params with a constant.
pub fn literal(value: Json) -> Composition {
    Composition::new(Node::literal(value))
}

/// `value(v)` = `literal(v)`; default value is the empty object.
pub fn value(v: Option<Json>) -> Composition {
    literal(v.unwrap_or_else(|| serde_json::json!({})))
}

/// `sequence(...)`/`seq(...)` — flatten children to a sequence.
pub fn sequence(children: Vec<Composition>) -> Result<Composition, BuildError> {
    let (nodes, attached) = merge_all(children)?;
    let flattened = flatten(nodes);
    Ok(Composition::with_attached(Node::Sequence { children: flattened }, attached))
}

/// Alias for [`sequence`].
pub fn seq(children: Vec<Composition>) -> Result<Composition, BuildError> {
    sequence(children)
}

fn flatten(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Sequence { children } => out.extend(flatten(children)),
            other => out.push(other),
        }
    }
    out
}

/// `if{test, consequent, alternate, options}`.
pub fn if_(
    test: Composition,
    consequent: Composition,
    alternate: Composition,
    nosave: bool,
) -> Result<Composition, BuildError> {
    let (mut nodes, attached) = merge_all(vec![test, consequent, alternate])?;
    let alternate = Box::new(nodes.pop().unwrap());
    let consequent = Box::new(nodes.pop().unwrap());
    let test = Box::new(nodes.pop().unwrap());
    Ok(Composition::with_attached(
        Node::If {
            test,
            consequent,
            alternate,
            options: ConditionalOptions { nosave },
        },
        attached,
    ))
}

/// `while{test, body, options}`.
pub fn while_(test: Composition, body: Composition, nosave: bool) -> Result<Composition, BuildError> {
    let (mut nodes, attached) = merge_all(vec![test, body])?;
    let body = Box::new(nodes.pop().unwrap());
    let test = Box::new(nodes.pop().unwrap());
    Ok(Composition::with_attached(
        Node::While {
            test,
            body,
            options: ConditionalOptions { nosave },
        },
        attached,
    ))
}

/// `dowhile{body, test, options}`.
pub fn dowhile(body: Composition, test: Composition, nosave: bool) -> Result<Composition, BuildError> {
    let (mut nodes, attached) = merge_all(vec![body, test])?;
    let test = Box::new(nodes.pop().unwrap());
    let body = Box::new(nodes.pop().unwrap());
    Ok(Composition::with_attached(
        Node::DoWhile {
            body,
            test,
            options: ConditionalOptions { nosave },
        },
        attached,
    ))
}

/// `try{body, handler}`.
pub fn try_(body: Composition, handler: Composition) -> Result<Composition, BuildError> {
    let (mut nodes, attached) = merge_all(vec![body, handler])?;
    let handler = Box::new(nodes.pop().unwrap());
    let body = Box::new(nodes.pop().unwrap());
    Ok(Composition::with_attached(Node::Try { body, handler }, attached))
}

/// `finally{body, finalizer}`.
pub fn finally(body: Composition, finalizer: Composition) -> Result<Composition, BuildError> {
    let (mut nodes, attached) = merge_all(vec![body, finalizer])?;
    let finalizer = Box::new(nodes.pop().unwrap());
    let body = Box::new(nodes.pop().unwrap());
    Ok(Composition::with_attached(Node::Finally { body, finalizer }, attached))
}

/// `let{declarations, body}`.
pub fn let_(declarations: IndexMap<String, Json>, body: Composition) -> Result<Composition, BuildError> {
    let Composition { node, attached } = body;
    Ok(Composition::with_attached(
        Node::Let {
            declarations,
            body: Box::new(node),
        },
        attached,
    ))
}

/// `retain(body, {field?, catch?, filter?})` (spec §4.B).
pub fn retain(
    body: Composition,
    field: Option<String>,
    catch: bool,
    filter: Option<Composition>,
) -> Result<Composition, BuildError> {
    let mut children = vec![body];
    if let Some(f) = filter {
        children.push(f);
    }
    let (mut nodes, attached) = merge_all(children)?;
    let filter = if nodes.len() > 1 {
        Some(Box::new(nodes.pop().unwrap()))
    } else {
        None
    };
    let body = Box::new(nodes.remove(0));
    Ok(Composition::with_attached(
        Node::Retain {
            body,
            options: RetainOptions { field, catch, filter },
        },
        attached,
    ))
}

/// `repeat(n, body...)` ≡ `let({count:n}, while(fn(() => count-- > 0), seq(body...)))`.
pub fn repeat(n: i64, body: Vec<Composition>) -> Result<Composition, BuildError> {
    let body_seq = sequence(body)?;
    let test = function("({value: count-- > 0})");
    let loop_ = while_(test, body_seq, false)?;
    let mut decls = IndexMap::new();
    decls.insert("count".to_string(), serde_json::json!(n));
    let_(decls, loop_)
}

/// `retry(n, body...)` — run `body` up to `n+1` times, catching its
/// error into a normal result each attempt, looping while that result
/// carries an error and attempts remain; returns the final result.
pub fn retry(n: i64, body: Vec<Composition>) -> Result<Composition, BuildError> {
    let body_seq = sequence(body)?;
    let retained = retain(body_seq, None, true, None)?;
    let test = function("({value: params.result.error !== undefined && count-- > 0})");
    let loop_ = dowhile(retained, test, false)?;
    let unwrap = function("params.result");
    let mut decls = IndexMap::new();
    decls.insert("count".to_string(), serde_json::json!(n));
    let_(decls, sequence(vec![loop_, unwrap])?)
}

/// `named(qname)` — wrap the whole composition under a single action node
/// and append an attachment whose payload is the original tree
/// (`kind = composition`, spec §4.B).
pub fn named(composition: Composition, qname: &str) -> Result<Composition, BuildError> {
    let canonical = composer_core::canonicalize(qname)?;
    let code = serde_json::to_string(&composition.node).expect("Node always serializes");

    let mut attached = composition.attached;
    let attachment = AttachedAction {
        name: canonical.clone(),
        action: AttachedActionBody {
            exec: Exec {
                kind: ExecKind::Composition,
                code,
            },
            annotations: None,
        },
    };
    if attached.insert(canonical.clone(), attachment).is_some() {
        return Err(BuildError::DuplicateAction(canonical));
    }
    Ok(Composition::with_attached(Node::action(canonical), attached))
}
