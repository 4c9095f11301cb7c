//! Interface to the external text-generation service.
//!
//! The service is opaque: a prompt goes in, text and token usage come
//! out. Implementations live in `longform-llm`; tests use scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One call to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the service for a strict JSON object response.
    pub json_response: bool,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.7,
            max_tokens: None,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl GenerationUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: GenerationUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub usage: GenerationUsage,
}

/// Failure of a single generation call.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation call timed out after {0}s")]
    Timeout(u64),

    #[error("Generation service rate limited the request")]
    RateLimited,

    #[error("Generation service returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Generation transport error: {0}")]
    Transport(String),

    /// The request itself was rejected (4xx other than 429).
    #[error("Generation request rejected: {0}")]
    Malformed(String),

    /// The service answered but the payload was unusable.
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Retryable failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }
}

/// The text-generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError>;
}
