use thiserror::Error;

/// Errors produced while building the metamodel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("view type {view} declares attribute {attribute} more than once")]
    DuplicateAttribute { view: String, attribute: String },

    #[error("view type {view} names unknown id attribute {attribute}")]
    UnknownIdAttribute { view: String, attribute: String },

    #[error("attribute {attribute} of view type {view} cannot be the id: {reason}")]
    InvalidIdAttribute {
        view: String,
        attribute: String,
        reason: String,
    },
}

/// Result alias for metamodel operations.
pub type TypeResult<T> = Result<T, TypeError>;
