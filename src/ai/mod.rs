pub mod openai;
pub mod token;
pub mod types;

use async_trait::async_trait;

use crate::error::ReviewerError;
use types::{CompletionOutcome, Conversation, FunctionSchema};

/// Trait for completion service clients.
///
/// Implementors handle a single provider family (e.g. OpenAI-compatible
/// endpoints). Object-safe for dynamic dispatch via `Arc<dyn CompletionClient>`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a conversation to the service.
    ///
    /// When `function` is set the model is constrained to answer with a
    /// structured call matching the schema; the call payload (if any) is
    /// returned in `CompletionOutcome::function_call`.
    async fn complete(
        &self,
        conversation: &Conversation,
        function: Option<&FunctionSchema>,
    ) -> Result<CompletionOutcome, ReviewerError>;
}
