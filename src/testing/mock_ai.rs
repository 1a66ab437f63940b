use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ai::CompletionClient;
use crate::ai::types::{CompletionOutcome, Conversation, FinishReason, FunctionSchema};
use crate::error::ReviewerError;

/// What a mocked completion call observed: the full prompt text and the
/// function schema name, if any.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
    pub function: Option<String>,
}

/// A scripted [`CompletionClient`].
///
/// Responses are served from a queue; once the queue is empty the repeat
/// response, if any, is served forever. `failing` makes every call error.
pub struct MockCompletionClient {
    queued: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    failure: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletionClient {
    /// Serve `reply` for every call.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            repeat: Some(reply.into()),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `replies` in order, erroring once they run out.
    pub fn with_responses(replies: Vec<String>) -> Self {
        Self {
            queued: Mutex::new(replies.into()),
            repeat: None,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with a completion error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            repeat: None,
            failure: Some(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        function: Option<&FunctionSchema>,
    ) -> Result<CompletionOutcome, ReviewerError> {
        let messages = conversation.messages();
        self.calls.lock().unwrap().push(RecordedCall {
            system: messages.first().map(|m| m.content.clone()).unwrap_or_default(),
            user: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
            function: function.map(|f| f.name.clone()),
        });

        if let Some(message) = &self.failure {
            return Err(ReviewerError::Completion(message.clone()));
        }

        let content = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| ReviewerError::Completion("mock responses exhausted".to_string()))?;

        Ok(CompletionOutcome {
            content,
            function_call: None,
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }
}
