use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::{Chat, Message, Prompt},
    providers::openrouter,
};
use tracing::{debug, error};

use super::{ChatRequest, CompletionRequest, LanguageModel};
use crate::chat::{ChatMessage, ChatRole};
use crate::error::{FlowError, Result};

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// OpenRouter-backed model. Build one at startup and share it behind an `Arc`.
pub struct OpenRouterModel {
    client: openrouter::Client,
    model: String,
}

impl OpenRouterModel {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn to_rig_message(message: &ChatMessage) -> Message {
    match message.role {
        ChatRole::User => Message::user(message.content.clone()),
        ChatRole::Assistant => Message::assistant(message.content.clone()),
    }
}

#[async_trait]
impl LanguageModel for OpenRouterModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        let mut builder = self.client.agent(&self.model).preamble(&request.preamble);
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        agent.prompt(request.prompt).await.map_err(|e| {
            error!(model = %self.model, "Completion request failed: {}", e);
            FlowError::Llm(e.to_string())
        })
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        debug!(
            model = %self.model,
            turns = request.history.len(),
            "Sending chat turn"
        );

        let mut builder = self
            .client
            .agent(&self.model)
            .preamble(&request.system_instruction);
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        let history: Vec<Message> = request.history.iter().map(to_rig_message).collect();
        agent
            .chat(request.message, history)
            .await
            .map_err(|e| FlowError::Llm(e.to_string()))
    }
}
