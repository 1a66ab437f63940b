use std::collections::HashMap;

use tiktoken_rs::CoreBPE;

use super::types::Conversation;

/// Tokens reserved for the model's reply when deciding whether a
/// conversation fits. This is the documented safety margin: the o200k
/// estimate can drift from a provider's true tokenizer, and per-message
/// framing costs a few tokens, but both effects are far smaller than this
/// reservation, so a conversation reported as fitting is never rejected by
/// the service as oversized.
pub const OUTPUT_BUFFER_TOKENS: u32 = 1500;

/// Per-message framing overhead (role tags, separators).
const PER_MESSAGE_OVERHEAD_TOKENS: u32 = 4;
/// Reply priming overhead.
const REPLY_PRIMING_TOKENS: u32 = 2;

/// Returns a shared tiktoken BPE encoder (o200k_base).
/// Initialized once on first call; subsequent calls are free.
fn encoder() -> &'static CoreBPE {
    tiktoken_rs::o200k_base_singleton()
}

/// Count the number of tokens in `text` using the o200k_base BPE encoder.
pub fn count_tokens(text: &str) -> u32 {
    encoder().encode_ordinary(text).len() as u32
}

/// Context capacity per model, with a fallback for unknown models.
///
/// Built from configuration and passed explicitly into the estimator and
/// planner — never a process-wide table, so tests can exercise multiple
/// budgets without interference.
#[derive(Debug, Clone)]
pub struct ModelLimits {
    limits: HashMap<String, u32>,
    default_max: u32,
}

impl ModelLimits {
    pub fn new(limits: HashMap<String, u32>, default_max: u32) -> Self {
        Self {
            limits,
            default_max,
        }
    }

    /// Maximum context tokens for `model`.
    pub fn capacity(&self, model: &str) -> u32 {
        self.limits.get(model).copied().unwrap_or(self.default_max)
    }
}

/// Token estimator bound to an explicit capacity table.
///
/// `estimate` is monotonic in its input: appending text never decreases the
/// count, and a conversation estimate is the sum of its message estimates
/// plus fixed overheads. Batch-planning correctness depends on this.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    limits: ModelLimits,
}

impl TokenEstimator {
    pub fn new(limits: ModelLimits) -> Self {
        Self { limits }
    }

    pub fn estimate(&self, text: &str) -> u32 {
        count_tokens(text)
    }

    /// Estimate the total prompt tokens a conversation will consume.
    pub fn estimate_conversation(&self, conversation: &Conversation) -> u32 {
        let content: u32 = conversation
            .messages()
            .iter()
            .map(|m| count_tokens(&m.content) + PER_MESSAGE_OVERHEAD_TOKENS)
            .sum();
        content + REPLY_PRIMING_TOKENS
    }

    /// Whether `conversation` fits `model`'s context, leaving room for the
    /// reply.
    pub fn fits(&self, conversation: &Conversation, model: &str) -> bool {
        let capacity = self.limits.capacity(model);
        self.estimate_conversation(conversation) + OUTPUT_BUFFER_TOKENS < capacity
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(model: &str, capacity: u32) -> TokenEstimator {
        let mut limits = HashMap::new();
        limits.insert(model.to_string(), capacity);
        TokenEstimator::new(ModelLimits::new(limits, 1000))
    }

    #[test]
    fn test_count_tokens() {
        let tokens = count_tokens("Hello, world!");
        assert!(tokens > 0);
        assert!(tokens < 10);
    }

    #[test]
    fn test_count_tokens_empty() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_capacity_fallback_for_unknown_model() {
        let limits = ModelLimits::new(HashMap::new(), 32_000);
        assert_eq!(limits.capacity("never-heard-of-it"), 32_000);
    }

    #[test]
    fn test_estimate_monotonic_under_concatenation() {
        let est = estimator("m", 100_000);
        let a = "fn main() { println!(\"hi\"); }\n";
        let b = "let x = compute(a, b, c);\n";
        let combined = format!("{a}{b}");
        assert!(est.estimate(&combined) >= est.estimate(a));
        assert!(est.estimate(&combined) >= est.estimate(b));
    }

    #[test]
    fn test_conversation_estimate_exceeds_content_estimate() {
        let est = estimator("m", 100_000);
        let conv = Conversation::new("system prompt", "user payload");
        let content = est.estimate("system prompt") + est.estimate("user payload");
        assert!(est.estimate_conversation(&conv) > content);
    }

    #[test]
    fn test_fits_respects_output_buffer() {
        // Tiny capacity: even a small conversation must not fit once the
        // output buffer is reserved.
        let est = estimator("tiny", OUTPUT_BUFFER_TOKENS + 10);
        let conv = Conversation::new("sys", "a somewhat longer user message");
        assert!(!est.fits(&conv, "tiny"));

        let est = estimator("big", 100_000);
        assert!(est.fits(&conv, "big"));
    }
}
