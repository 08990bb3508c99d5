use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Bad template, step, or request configuration supplied by a caller.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation is not allowed from the record's current state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// An approver-resolution strategy could not be satisfied.
    #[error("Approver resolution failed: {0}")]
    Resolution(String),

    /// A template has no usable steps.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
