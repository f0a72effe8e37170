//! Combinator AST builder and FSM compiler for composer workflows.

pub mod ast;
pub mod compile;

pub use ast::{
    BuildError, Composition, Node, Serialized, TaskInput, action, dowhile, finally, function,
    if_, let_, literal, named, repeat, retain, retry, seq, sequence, task, try_, value, while_,
};
pub use compile::compile;
