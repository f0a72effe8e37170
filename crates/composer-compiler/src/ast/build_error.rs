//! AST-builder validation errors (spec §7 `InvalidArgument`/`DuplicateAction`/`CannotEncode`).

use composer_core::Json;

/// Error raised while constructing or transforming a composition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// A combinator's argument had the wrong type, arity, or value.
    #[error("invalid argument to `{combinator}`: {reason} (got {argument})")]
    InvalidArgument {
        combinator: &'static str,
        reason: &'static str,
        argument: Json,
    },
    /// Two attached actions share a name.
    #[error("duplicate attached action: {0:?}")]
    DuplicateAction(String),
    /// `encode` was called on a composition that is not a single named action.
    #[error("cannot encode: composition is not a single named action")]
    CannotEncode,
    /// An action name failed to canonicalize.
    #[error(transparent)]
    InvalidName(#[from] composer_core::NameError),
}

impl BuildError {
    pub fn invalid_argument(combinator: &'static str, reason: &'static str, argument: Json) -> Self {
        Self::InvalidArgument {
            combinator,
            reason,
            argument,
        }
    }
}
