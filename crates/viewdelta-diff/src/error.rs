//! Error types for the change engine.

use viewdelta_tracking::TrackingError;

/// Errors raised while dereferencing or enumerating change nodes.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The attribute is not declared by the expected view type, is not
    /// tracked, or the path names no attribute at all.
    #[error("invalid attribute '{attribute}' in path '{path}'")]
    InvalidAttribute { attribute: String, path: String },

    /// A path continues past a basic leaf, or a singular-only operation
    /// was applied to a plural node.
    #[error("invalid dereference of '{path}': {reason}")]
    InvalidDereference { path: String, reason: String },

    /// A plural-only or map-only operation on a node that is neither.
    #[error("{operation} is only available on plural change models")]
    NotPlural { operation: &'static str },

    /// An internal invariant does not hold.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Failure in the tracking layer.
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// The configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience alias for change-engine results.
pub type DiffResult<T> = Result<T, DiffError>;

impl DiffError {
    pub(crate) fn dereference(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDereference {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn attribute(attribute: &str, path: &str) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.to_string(),
            path: path.to_string(),
        }
    }
}
