//! Stack-machine interpreter that steps compiled compositions, plus the
//! `encode` operation that turns a named composition into a deployable
//! conductor document.

pub mod encode;
pub mod engine;

pub use encode::{EncodeError, encode};
pub use engine::{
    DeclarativeEvaluator, EvalError, EvalOutcome, Frame, InlineEvaluator, NoopTracer, Outcome,
    PrintTracer, Resume, RuntimeError, Tracer, encode_error, is_truthy, step,
};
