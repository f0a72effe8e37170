//! The flat FSM instruction set (spec §3.3).
//!
//! Every instruction carries a symbolic `path` into the original AST (for
//! diagnostics) and, where applicable, relative jump offsets: `next` is the
//! default successor (absent means "terminate"), `then`/`else` are only on
//! `Choice`, and `catch` is only on `Try`. Offsets are relative to the
//! instruction that carries them, never absolute indices — this is what
//! makes `Program::chain` a pure concatenation (spec §9 Design Notes).

use composer_core::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One instruction in a compiled FSM program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Instruction {
    /// No-op, used as a join point or sentinel.
    Pass(PassInstr),
    /// Request the host to invoke a named action; suspends the conductor.
    Action(ActionInstr),
    /// Evaluate inline source against `params` in the current environment.
    Function(FunctionInstr),
    /// Replace `params` with a deep copy of a constant value.
    Literal(Literal),
    /// Branch on the truthiness of `params.value`.
    Choice(Choice),
    /// Push a catch frame whose target is `current + catch`.
    Try(TryInstr),
    /// Pop the top frame. Requires a non-empty stack.
    Exit(ExitInstr),
    /// Push an environment (let) frame.
    Let(LetInstr),
    /// Push a save-frame snapshotting current params (optionally one field).
    Push(PushInstr),
    /// Pop a save-frame, optionally merging `{params, result}`.
    Pop(PopInstr),
}

impl Instruction {
    /// The diagnostic path of this instruction.
    pub fn path(&self) -> &str {
        match self {
            Self::Pass(i) => &i.path,
            Self::Action(i) => &i.path,
            Self::Function(i) => &i.path,
            Self::Literal(i) => &i.path,
            Self::Choice(i) => &i.path,
            Self::Try(i) => &i.path,
            Self::Exit(i) => &i.path,
            Self::Let(i) => &i.path,
            Self::Push(i) => &i.path,
            Self::Pop(i) => &i.path,
        }
    }

    /// Default successor offset (`next`), if this instruction has one.
    /// `Choice` has no `next` of its own — it only ever jumps via
    /// `then`/`else`.
    pub fn next(&self) -> Option<i32> {
        match self {
            Self::Pass(i) => i.next,
            Self::Action(i) => i.next,
            Self::Function(i) => i.next,
            Self::Literal(i) => i.next,
            Self::Choice(_) => None,
            Self::Try(i) => i.next,
            Self::Exit(i) => i.next,
            Self::Let(i) => i.next,
            Self::Push(i) => i.next,
            Self::Pop(i) => i.next,
        }
    }

    /// Set the default successor offset, where this instruction has one.
    /// No-op on `Choice`.
    pub fn set_next(&mut self, offset: i32) {
        match self {
            Self::Pass(i) => i.next = Some(offset),
            Self::Action(i) => i.next = Some(offset),
            Self::Function(i) => i.next = Some(offset),
            Self::Literal(i) => i.next = Some(offset),
            Self::Choice(_) => {}
            Self::Try(i) => i.next = Some(offset),
            Self::Exit(i) => i.next = Some(offset),
            Self::Let(i) => i.next = Some(offset),
            Self::Push(i) => i.next = Some(offset),
            Self::Pop(i) => i.next = Some(offset),
        }
    }

    /// All jump offsets this instruction carries, relative to itself.
    pub fn jumps(&self) -> Vec<i32> {
        match self {
            Self::Choice(c) => vec![c.then, c.else_],
            Self::Try(t) => {
                let mut v = vec![t.catch];
                v.extend(t.next);
                v
            }
            other => other.next().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecKind {
    /// Opaque source text, evaluated by the host's inline evaluator.
    Source,
    /// A native sequence of action names elevated into an attached action.
    Sequence,
    /// An attached action whose `code` is the JSON-serialized original
    /// composition tree, not yet lowered to a deployable action body.
    /// `encode` (spec §4.B) replaces every such attachment with one whose
    /// `code` is the conductor-deployable document for that tree.
    Composition,
    /// `code` is a serialized `Program`: the compiled FSM, ready to hand
    /// to a host running this conductor. The original tree survives
    /// alongside it as a `conductor` annotation, not inside `code`. This
    /// is what `Composition` attachments become after `encode`.
    Conductor,
}

/// An inline function body: opaque source evaluated against `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exec {
    pub kind: ExecKind,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassInstr {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInstr {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInstr {
    pub exec: Exec,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    pub value: Json,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub then: i32,
    #[serde(rename = "else")]
    pub else_: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryInstr {
    pub catch: i32,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitInstr {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetInstr {
    #[serde(rename = "let")]
    pub declarations: IndexMap<String, Json>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushInstr {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopInstr {
    #[serde(default)]
    pub collect: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_has_no_next() {
        let mut instr = Instruction::Choice(Choice {
            then: 1,
            else_: 4,
            path: ".test".into(),
        });
        instr.set_next(10);
        assert_eq!(instr.next(), None);
        assert_eq!(instr.jumps(), vec![1, 4]);
    }

    #[test]
    fn try_jumps_include_catch_and_next() {
        let instr = Instruction::Try(TryInstr {
            catch: 5,
            path: ".body".into(),
            next: Some(1),
        });
        assert_eq!(instr.jumps(), vec![5, 1]);
    }

    #[test]
    fn action_next_roundtrips() {
        let mut instr = Instruction::Action(ActionInstr {
            name: "/_/echo".into(),
            path: ".".into(),
            next: None,
        });
        assert_eq!(instr.next(), None);
        instr.set_next(1);
        assert_eq!(instr.next(), Some(1));
    }
}
