use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ChatRequest, CompletionRequest, LanguageModel};
use crate::error::{FlowError, Result};

/// What a [`MockLanguageModel`] was asked.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    Complete(CompletionRequest),
    Chat(ChatRequest),
}

impl RecordedCall {
    /// The user-visible text of the call: the prompt or the chat message.
    pub fn text(&self) -> &str {
        match self {
            RecordedCall::Complete(request) => &request.prompt,
            RecordedCall::Chat(request) => &request.message,
        }
    }

    pub fn system(&self) -> &str {
        match self {
            RecordedCall::Complete(request) => &request.preamble,
            RecordedCall::Chat(request) => &request.system_instruction,
        }
    }
}

type Responder = dyn Fn(&RecordedCall) -> Result<String> + Send + Sync;

/// Scripted stand-in for a hosted model. Every call is recorded and answered
/// by the responder closure.
#[derive(Clone)]
pub struct MockLanguageModel {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockLanguageModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every call with the same text.
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Fails every call.
    pub fn failing(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move |_| Err(FlowError::Llm(reason.clone())))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn answer(&self, call: RecordedCall) -> Result<String> {
        let reply = (self.responder)(&call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        reply
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.answer(RecordedCall::Complete(request))
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        self.answer(RecordedCall::Chat(request))
    }
}
