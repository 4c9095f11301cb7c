use longform_core::error::CoreError;
use longform_core::generation::GenerationError;
use longform_core::retry::FailureKind;
use longform_core::store::StoreError;

/// Why a generation attempt did not produce a script.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Chunk {chunk} generation failed: {source}")]
    Generation {
        chunk: usize,
        #[source]
        source: GenerationError,
    },

    #[error("Store error during generation: {0}")]
    Store(#[from] StoreError),

    #[error("Job has no usable content plan: {0}")]
    InvalidPlan(String),

    #[error("Time budget exhausted before chunk {chunk} finished")]
    BudgetExhausted { chunk: usize },
}

impl OrchestrationError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Generation { source, .. } if !source.is_retryable() => FailureKind::Fatal,
            Self::InvalidPlan(_) => FailureKind::Fatal,
            _ => FailureKind::Retryable,
        }
    }
}

impl From<OrchestrationError> for CoreError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Store(e) => e.into(),
            OrchestrationError::InvalidPlan(msg) => CoreError::Validation(msg),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
