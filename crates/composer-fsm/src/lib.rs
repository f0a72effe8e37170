//! FSM instruction schema shared by the composition compiler and conductor.
//!
//! This crate owns the wire format only: the flat, JSON-serializable
//! instruction array a composition compiles down to, and the relative-jump
//! bookkeeping (`chain`, validation) that both the compiler (producer) and
//! the conductor (consumer) need. Keeping the schema in its own crate lets
//! compiler and conductor each depend on it without depending on each other.

pub mod instruction;
pub mod program;

pub use instruction::{
    ActionInstr, Choice, Exec, ExecKind, ExitInstr, FunctionInstr, Instruction, LetInstr, Literal,
    PassInstr, PopInstr, PushInstr, TryInstr,
};
pub use program::{Program, ProgramError};
