//! Error types for the plug graph

use thiserror::Error;

/// Result type alias using PlugGraphError
pub type Result<T> = std::result::Result<T, PlugGraphError>;

/// Errors that can occur while editing or evaluating a plug graph
///
/// Errors are `Clone` so that a single failed computation can be delivered
/// to every caller waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlugGraphError {
    /// A connection was rejected because of direction or type
    #[error("Incompatible input: {0}")]
    IncompatibleInput(String),

    /// A connection was rejected because it would create a cycle
    #[error("Cyclic connection: {0}")]
    CyclicConnection(String),

    /// Context variable not found
    #[error("Context variable not found: {0}")]
    KeyNotFound(String),

    /// Context variable holds a value of an unexpected type
    #[error("Context variable '{key}' is not of type {expected}")]
    InvalidContextValue { key: String, expected: String },

    /// A node failed to hash or compute an output
    #[error("Compute error on '{plug}': {message}")]
    Compute { plug: String, message: String },

    /// Evaluation was cancelled
    #[error("Evaluation cancelled")]
    Cancelled,

    /// A child was rejected by its parent plug
    #[error("Invalid child for '{parent}': {message}")]
    InvalidChild { parent: String, message: String },

    /// A value could not be assigned to a plug
    #[error("Invalid value for '{plug}': {message}")]
    InvalidValue { plug: String, message: String },

    /// Plug handle or path does not resolve
    #[error("Unknown plug: {0}")]
    UnknownPlug(String),

    /// Node handle or name does not resolve
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Node type is not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A sibling with the same name already exists
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Broken engine invariant (e.g. a cache hit of the wrong type)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PlugGraphError {
    /// Create a compute error for a plug
    pub fn compute(plug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compute {
            plug: plug.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wrap a failure raised while hashing or computing `plug`.
    ///
    /// `Compute` and `Cancelled` pass through unchanged so the original
    /// failing plug is reported to every caller up the chain.
    pub(crate) fn into_compute(self, plug: &str) -> Self {
        match self {
            Self::Compute { .. } | Self::Cancelled => self,
            other => Self::compute(plug, other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PlugGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_compute_wraps_other_errors() {
        let err = PlugGraphError::KeyNotFound("frame".to_string()).into_compute("n.out");
        match err {
            PlugGraphError::Compute { plug, message } => {
                assert_eq!(plug, "n.out");
                assert!(message.contains("frame"));
            }
            other => panic!("Expected Compute error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_compute_keeps_origin() {
        let err = PlugGraphError::compute("a.out", "bad input").into_compute("b.out");
        assert_eq!(err, PlugGraphError::compute("a.out", "bad input"));

        let err = PlugGraphError::Cancelled.into_compute("b.out");
        assert!(err.is_cancelled());
    }
}
