//! Core data structures shared by the composition compiler and conductor.
//!
//! This crate has no dependency on its sibling crates: it holds the
//! qualified-name resolver, the JSON value alias used for every
//! "params"/"value" payload in the system, and the small set of error
//! types every other crate's error enum wraps.

pub mod name;

pub use name::{NameError, canonicalize};

/// The JSON value travelling through a composition's pipeline.
///
/// `serde_json::Value::clone` is a full structural deep copy, which is
/// exactly what the `push`, `let`, and `literal` instructions require.
pub type Json = serde_json::Value;
