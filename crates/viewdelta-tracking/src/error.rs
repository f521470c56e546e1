//! Error types for the tracking crate.

/// Errors from tracked-object and container operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackingError {
    /// The view type declares no attribute with this name.
    #[error("view type {view} has no attribute {attribute}")]
    UnknownAttribute { view: String, attribute: String },

    /// The attribute exists but occupies no tracked slot.
    #[error("attribute {attribute} of view type {view} is not tracked")]
    UntrackedAttribute { view: String, attribute: String },

    /// A value does not fit the declared attribute or element type.
    #[error("{target} expects {expected}, got {actual}")]
    ShapeMismatch {
        target: String,
        expected: String,
        actual: String,
    },

    /// The object is already owned by a different live parent.
    #[error("illegal state: {what} is already owned by {owner}")]
    OwnershipConflict { what: String, owner: String },

    /// Positional access outside the container.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Containers hold no null elements or keys.
    #[error("{container} cannot hold null elements")]
    NullElement { container: String },
}

/// Result alias for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
