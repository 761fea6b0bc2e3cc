use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::llm::{ChatRequest, LanguageModel};
use crate::preprocess::truncate_chars;

pub const CHAT_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

const CHAT_TEMPERATURE: f64 = 0.3;
const CHAT_MAX_TOKENS: u64 = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// The fixed instruction every assistant session starts from. The report
/// context is the only knowledge the assistant may draw on.
pub fn system_instruction(report_context: &str) -> String {
    format!(
        r#"You are an expert AI assistant specializing in GDC (General Dental Council) standards and dental practice compliance.
You have extensive experience in dental practice inspections and compliance analysis.

Answer ONLY from the REPORT CONTEXT below. If the answer is not contained in the report context,
say clearly that the report does not cover it instead of guessing.

RESPONSE FORMATTING RULES:
- ALWAYS use clear headings with ## for main sections
- ALWAYS use bullet points for lists
- ALWAYS break complex information into short sections
- NEVER write long, dense paragraphs
- When describing an implementation plan, number the steps (Step 1, Step 2, ...)

RESPONSE STRUCTURE TEMPLATE:
## [Main Answer Heading]
- Key point 1
- Key point 2

## [Supporting Details]
- Additional context from the report

## [Action Steps]
- Step 1: [clear action]
- Step 2: [clear action]

Maintain a professional, helpful, and encouraging tone.

REPORT CONTEXT:
{}"#,
        report_context
    )
}

/// A conversation bound to one report. The context is fixed at creation;
/// a new report means a new session.
pub struct ChatSession {
    model: Arc<dyn LanguageModel>,
    system_instruction: String,
    /// Turns exchanged with the model, replayed on every call
    history: Vec<ChatMessage>,
    /// Display-side, append-only; starts with the greeting
    transcript: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn create(
        model: Arc<dyn LanguageModel>,
        report_context: &str,
        greeting: &str,
        context_char_budget: usize,
    ) -> Self {
        let context = truncate_chars(report_context, context_char_budget);
        info!(context_chars = context.len(), "Created chat session");
        Self {
            model,
            system_instruction: system_instruction(context),
            history: Vec::new(),
            transcript: vec![ChatMessage::assistant(greeting)],
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Send one user message and return the assistant's entry in the
    /// transcript. A failed call is answered with [`CHAT_APOLOGY`] and the
    /// session stays usable.
    pub async fn send_message(&mut self, text: &str) -> Result<&ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowError::InvalidInput("Message cannot be empty".to_string()));
        }

        let user_message = ChatMessage::user(text);
        self.transcript.push(user_message.clone());

        let request = ChatRequest {
            system_instruction: self.system_instruction.clone(),
            history: self.history.clone(),
            message: text.to_string(),
            temperature: Some(CHAT_TEMPERATURE),
            max_tokens: Some(CHAT_MAX_TOKENS),
        };

        let reply = match self.model.chat(request).await {
            Ok(reply) => {
                let reply = ChatMessage::assistant(reply);
                self.history.push(user_message);
                self.history.push(reply.clone());
                reply
            }
            Err(e) => {
                error!("Chat turn failed: {}", e);
                ChatMessage::assistant(CHAT_APOLOGY)
            }
        };

        self.transcript.push(reply);
        let last = self.transcript.len() - 1;
        Ok(&self.transcript[last])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLanguageModel, RecordedCall};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn greeting_comes_first_and_turns_append() {
        let model = Arc::new(MockLanguageModel::new(|call| {
            Ok(format!("## Answer\n- about {}", call.text()))
        }));
        let mut session = ChatSession::create(model.clone(), "## Strengths\n- audits", "Hello!", 4000);

        let reply = session.send_message("What about audits?").await.unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "## Answer\n- about What about audits?");

        let roles: Vec<ChatRole> = session.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]);
        assert_eq!(session.transcript()[0].content, "Hello!");
    }

    #[tokio::test]
    async fn prior_turns_are_replayed() {
        let model = Arc::new(MockLanguageModel::fixed("noted"));
        let mut session = ChatSession::create(model.clone(), "ctx", "Hi", 4000);

        session.send_message("first").await.unwrap();
        session.send_message("second").await.unwrap();

        let calls = model.calls();
        let RecordedCall::Chat(last) = &calls[1] else {
            panic!("expected a chat call");
        };
        let replayed: Vec<&str> = last.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(replayed, vec!["first", "noted"]);
        assert_eq!(last.message, "second");
        assert!(last.system_instruction.contains("REPORT CONTEXT:\nctx"));
    }

    #[tokio::test]
    async fn failure_appends_apology_and_session_survives() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let model = Arc::new(MockLanguageModel::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FlowError::Llm("timeout".to_string()))
            } else {
                Ok("recovered".to_string())
            }
        }));
        let mut session = ChatSession::create(model.clone(), "ctx", "Hi", 4000);

        let first = session.send_message("one").await.unwrap().content.clone();
        assert_eq!(first, CHAT_APOLOGY);

        let second = session.send_message("two").await.unwrap().content.clone();
        assert_eq!(second, "recovered");

        // the failed exchange is shown but never replayed
        let calls = model.calls();
        let RecordedCall::Chat(last) = &calls[1] else {
            panic!("expected a chat call");
        };
        assert!(last.history.is_empty());
        assert_eq!(session.transcript().len(), 5);
    }

    #[tokio::test]
    async fn rejects_blank_messages_without_calling_the_model() {
        let model = Arc::new(MockLanguageModel::fixed("unused"));
        let mut session = ChatSession::create(model.clone(), "ctx", "Hi", 4000);

        assert!(matches!(
            session.send_message("   ").await,
            Err(FlowError::InvalidInput(_))
        ));
        assert_eq!(model.call_count(), 0);
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn context_is_truncated_to_budget() {
        let model = Arc::new(MockLanguageModel::fixed(""));
        let session = ChatSession::create(model, &"x".repeat(50), "Hi", 10);
        assert!(session.system_instruction().ends_with(&"x".repeat(10)));
        assert!(!session.system_instruction().contains(&"x".repeat(11)));
    }
}
