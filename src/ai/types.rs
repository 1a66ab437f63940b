use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged segment of a conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// An ordered sequence of role-tagged segments representing one request to
/// the completion service. Built fresh per batch; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message {
                    role: Role::System,
                    content: system.into(),
                },
                Message {
                    role: Role::User,
                    content: user.into(),
                },
            ],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// JSON schema for a constrained structured-call request.
#[derive(Debug, Clone)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A structured call emitted by the model in function-call mode.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON-encoded arguments, parsed by the caller.
    pub arguments: String,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    #[default]
    Unknown,
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        match s {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" => Self::ToolCalls,
            _ => Self::Unknown,
        }
    }
}

/// Token usage information returned by the API.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Outcome of a completion call: free text and, in function-call mode, the
/// structured call payload.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub content: String,
    pub function_call: Option<FunctionCall>,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}
