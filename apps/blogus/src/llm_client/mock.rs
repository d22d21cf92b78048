//! Scripted in-memory transport for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::registry::ModelId;
use crate::llm_client::{LlmError, Transport};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: ModelId,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Failure { status: u16, message: String },
}

/// Answers calls from a queue of scripted replies, in order, and records
/// every request it receives. Running out of replies is reported as a 503.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()));
        self
    }

    pub fn fail(self, status: u16, message: impl Into<String>) -> Self {
        self.push(Scripted::Failure {
            status,
            message: message.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn push(&self, reply: Scripted) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn complete(
        &self,
        model: ModelId,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model,
                prompt: prompt.to_string(),
                max_tokens,
            });
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure { status, message }) => Err(LlmError::Api { status, message }),
            None => Err(LlmError::Api {
                status: 503,
                message: "mock transport has no scripted reply left".to_string(),
            }),
        }
    }
}
