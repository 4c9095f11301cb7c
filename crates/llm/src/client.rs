//! HTTP client for an OpenAI-compatible chat completions endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;

use longform_core::generation::{
    GenerationError, GenerationOutput, GenerationRequest, GenerationService, GenerationUsage,
};
use longform_core::rate_limit::RateLimiter;

use crate::config::GenerationConfig;
use crate::wire::{ChatRequest, ChatResponse, Message, ResponseFormat};

/// Longest upstream error body kept in a [`GenerationError`].
const MAX_ERROR_BODY: usize = 500;

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: GenerationConfig,
    limiter: Arc<RateLimiter>,
}

impl ChatCompletionsClient {
    /// Build a client with its own rate limiter sized from `config`.
    pub fn new(config: GenerationConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.requests_per_minute,
            config.max_concurrency,
        ));
        Self::with_limiter(config, limiter)
    }

    /// Build a client that shares `limiter` with other callers.
    pub fn with_limiter(config: GenerationConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_response.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.config.api_url))
            .json(&body);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.config.timeout_secs)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        into_output(parsed)
    }
}

/// Map a non-success HTTP status to a generation error.
///
/// 429 and 5xx are retryable upstream conditions; any other 4xx means the
/// request itself is wrong.
pub fn classify_status(status: StatusCode, body: String) -> GenerationError {
    let body = truncate(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        GenerationError::Server {
            status: status.as_u16(),
            body,
        }
    } else {
        GenerationError::Malformed(format!("{}: {body}", status.as_u16()))
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

fn into_output(response: ChatResponse) -> Result<GenerationOutput, GenerationError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| GenerationError::InvalidResponse("response contained no text".into()))?;

    let usage = response
        .usage
        .map(|u| GenerationUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(GenerationOutput { text, usage })
}

#[async_trait]
impl GenerationService for ChatCompletionsClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let _permit = self.limiter.acquire().await;
        let start = Instant::now();

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result = match tokio::time::timeout(timeout, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.config.timeout_secs)),
        };

        match &result {
            Ok(output) => tracing::debug!(
                model = %self.config.model,
                duration_ms = start.elapsed().as_millis() as u64,
                completion_tokens = output.usage.completion_tokens,
                "Generation call succeeded",
            ),
            Err(e) => tracing::warn!(
                model = %self.config.model,
                duration_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Generation call failed",
            ),
        }
        result
    }
}
