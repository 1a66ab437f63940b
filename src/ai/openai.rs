use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::CompletionClient;
use super::types::{
    CompletionOutcome, Conversation, FinishReason, FunctionCall, FunctionSchema, Role, Usage,
};
use crate::config::types::Settings;
use crate::error::ReviewerError;

/// Number of retry attempts for transient API errors (not rate limits).
const MODEL_RETRIES: u32 = 2;

/// OpenAI-compatible chat completions client.
///
/// Works with any provider exposing the `/v1/chat/completions` API:
/// OpenAI, Azure OpenAI, Ollama, Groq, DeepSeek, OpenRouter, Mistral.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, ReviewerError> {
        let base_url = if settings.openai.api_base.is_empty() {
            "https://api.openai.com/v1".to_string()
        } else {
            settings.openai.api_base.clone()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.config.ai_timeout))
            .build()
            .map_err(ReviewerError::Http)?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.openai.key.clone(),
            model: settings.config.model.clone(),
            temperature: settings.config.temperature,
        })
    }

    fn build_request_body(
        &self,
        conversation: &Conversation,
        function: Option<&FunctionSchema>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = conversation
            .messages()
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                };
                json!({"role": role, "content": m.content})
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        if let Some(schema) = function {
            body["tools"] = json!([{
                "type": "function",
                "function": {
                    "name": schema.name,
                    "description": schema.description,
                    "parameters": schema.parameters,
                }
            }]);
            body["tool_choice"] = json!({
                "type": "function",
                "function": {"name": schema.name}
            });
        }

        body
    }

    /// Send a single request and parse the response. No retry logic here.
    async fn send_completion(
        &self,
        body: &serde_json::Value,
    ) -> Result<CompletionOutcome, ReviewerError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut req = self.client.post(&url).json(body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await.map_err(ReviewerError::Http)?;

        if !resp.status().is_success() {
            let status = resp.status();

            if status.as_u16() == 429 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(ReviewerError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let body_text = resp.text().await.unwrap_or_default();
            return Err(ReviewerError::Completion(format!(
                "API returned {status}: {body_text}"
            )));
        }

        let api_resp: ApiResponse = resp.json().await.map_err(ReviewerError::Http)?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ReviewerError::Completion("no choices in response".into()))?;

        let function_call = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|tc| FunctionCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
            });

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from)
            .unwrap_or_default();

        let usage = api_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionOutcome {
            content: choice.message.content.unwrap_or_default(),
            function_call,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        function: Option<&FunctionSchema>,
    ) -> Result<CompletionOutcome, ReviewerError> {
        let body = self.build_request_body(conversation, function);

        // Retry on transient errors with exponential backoff
        let mut last_err = None;
        for attempt in 0..=MODEL_RETRIES {
            match self.send_completion(&body).await {
                Ok(outcome) => return Ok(outcome),
                Err(e @ ReviewerError::RateLimited { .. }) => {
                    // Don't retry rate limits — propagate immediately
                    return Err(e);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MODEL_RETRIES + 1,
                        error = %e,
                        "completion request failed"
                    );
                    last_err = Some(e);

                    if attempt < MODEL_RETRIES {
                        let delay = Duration::from_secs(2u64.pow(attempt + 1));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ReviewerError::Completion("request never attempted".into())))
    }
}

// ── Response deserialization ───────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
