//! Error types for inference execution.

use thiserror::Error;

/// Errors that can occur during factor-graph validation or inference.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The model assigns zero probability to every projective tree.
    ///
    /// Raised when the partition function evaluates to the algebra's zero with
    /// otherwise finite inputs, typically because a pruning mask removed every
    /// consistent tree. Fatal for the current sentence; callers may catch this
    /// per sentence and skip or flag the example.
    #[error("infeasible model: {0}")]
    Infeasible(String),

    /// A factor has a shape or key range the engine does not support.
    ///
    /// Only bias-free unary edge factors, grandparent ternary factors, and the
    /// global projective-tree constraint are accepted.
    #[error("unsupported factor: {0}")]
    UnsupportedFactor(String),

    /// The factor graph lacks the global projective-tree constraint factor.
    ///
    /// Detected at the start of score-tensor construction, before any dynamic
    /// programming work begins.
    #[error("factor graph has no projective-tree constraint factor")]
    MissingTreeConstraint,

    /// Numerical stability error, such as a NaN potential.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Internal execution error.
    ///
    /// Used only for programmer errors, such as calling `backward()` without a
    /// prior `forward()`.
    #[error("internal error: {0}")]
    Internal(String),
}
