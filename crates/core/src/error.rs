use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Research material does not meet the policy for the requested
    /// duration. Carries the list of actions that would fix it.
    #[error("Insufficient research: {}", recommendations.join("; "))]
    InsufficientResearch { recommendations: Vec<String> },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A store write or read failed. Never swallowed: losing a job's final
    /// state is a correctness bug.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
