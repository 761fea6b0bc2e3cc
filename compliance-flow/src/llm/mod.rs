//! The seam between the pipeline and a hosted language model.
//!
//! Stages only ever talk to [`LanguageModel`], so the concrete provider is
//! chosen once at startup and tests can substitute [`MockLanguageModel`].

pub mod mock;
pub mod openrouter;

use async_trait::async_trait;

use crate::chat::ChatMessage;
use crate::error::Result;

pub use mock::{MockLanguageModel, RecordedCall};
pub use openrouter::OpenRouterModel;

/// A single-shot completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction for this call
    pub preamble: String,
    pub prompt: String,
    pub max_tokens: Option<u64>,
}

impl CompletionRequest {
    pub fn new(preamble: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            prompt: prompt.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// One conversational turn. `history` holds every prior exchanged turn so a
/// provider without server-side sessions can replay the conversation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub history: Vec<ChatMessage>,
    pub message: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    async fn chat(&self, request: ChatRequest) -> Result<String>;
}
