//! Scripted generation service for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use longform_core::generation::{
    GenerationError, GenerationOutput, GenerationRequest, GenerationService, GenerationUsage,
};

/// Replies with queued results in order, then with `fallback` text.
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    fallback: Option<String>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Answer every call with `text` once the queue is empty.
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| GenerationError::InvalidResponse("no scripted reply".into()))?,
        };
        Ok(GenerationOutput {
            usage: GenerationUsage {
                prompt_tokens: 10,
                completion_tokens: text.split_whitespace().count() as u64,
            },
            text,
        })
    }
}
