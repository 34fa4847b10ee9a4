use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    config::PlannerConfig,
    error::{PlannerError, Result},
    services::generation::{GenerationReply, GenerationRequest, GenerationService},
    types::TokenUsage,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat-completions client for OpenAI-compatible endpoints (OpenAI, OpenRouter, ...).
#[derive(Clone, Debug)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_max_tokens(config.max_tokens)
            .with_timeout(config.timeout)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST a chat-completions body and return the decoded JSON response.
    ///
    /// Every failure is terminal; callers decide whether to resubmit.
    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let request_url = build_chat_url(&self.base_url);
        debug!(target: "wanderplan::http", url = %request_url, model = %self.model, "sending chat completion");

        let response = self
            .http
            .post(&request_url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "wanderplan")
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_text = response.text().await.map_err(map_send_error)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(1);
            warn!(target: "wanderplan::http", retry_after, "rate limited by generation service");
            return Err(PlannerError::RateLimit {
                retry_after: retry_after.max(1),
            });
        }

        let response_json: Value = match serde_json::from_str(&response_text) {
            Ok(value) => value,
            Err(err) if status.is_success() => {
                return Err(PlannerError::Transport(format!(
                    "Failed to parse response body as JSON: {err}"
                )));
            }
            Err(_) => Value::Null,
        };

        if !status.is_success() {
            let api_message = api_error_message(&response_json).unwrap_or(response_text);
            return Err(PlannerError::Transport(format!(
                "HTTP {} error: {}",
                status, api_message
            )));
        }

        if response_json.get("error").is_some() {
            let message = api_error_message(&response_json)
                .unwrap_or_else(|| response_json["error"].to_string());
            return Err(PlannerError::Transport(format!("API error: {}", message)));
        }

        Ok(response_json)
    }
}

#[async_trait]
impl GenerationService for OpenAIClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationReply> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(json!({
            "role": "system",
            "content": request.system_instruction,
        }));
        messages.extend(request.messages);

        let body = ChatCompletionRequest::new(self.model.clone(), messages)
            .with_max_tokens(self.max_tokens)
            .with_response_format(request.schema.response_format())
            .into_value();

        let response = self.chat_completion(&body).await?;

        Ok(GenerationReply {
            text: extract_message_text(&response),
            usage: extract_usage(&response),
        })
    }
}

fn map_send_error(err: reqwest::Error) -> PlannerError {
    if err.is_timeout() {
        PlannerError::Timeout(format!("generation service did not answer in time: {err}"))
    } else {
        PlannerError::Transport(format!("HTTP request failed: {err}"))
    }
}

fn api_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

/// Text of the first choice. Content may be a plain string or a list of
/// `{"type": "text", "text": ...}` parts; blank text counts as no text.
fn extract_message_text(response: &Value) -> Option<String> {
    let content = response
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn count(usage: &Value, key: &str) -> Option<u32> {
    u32::try_from(usage.get(key)?.as_u64()?).ok()
}

fn extract_usage(response: &Value) -> Option<TokenUsage> {
    let usage = response.get("usage")?;
    Some(TokenUsage {
        prompt_tokens: count(usage, "prompt_tokens")?,
        completion_tokens: count(usage, "completion_tokens")?,
        total_tokens: count(usage, "total_tokens")?,
    })
}

#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    max_tokens: Option<u32>,
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            response_format: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_response_format(mut self, response_format: Value) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(response_format) = self.response_format {
            body["response_format"] = response_format;
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chat_url() {
        assert_eq!(
            build_chat_url("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            build_chat_url("http://localhost:1234/v1/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_extract_message_text() {
        let response = json!({"choices": [{"message": {"content": "{\"a\":1}"}}]});
        assert_eq!(extract_message_text(&response).as_deref(), Some("{\"a\":1}"));

        let parts = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"a\":"},
            {"type": "text", "text": "1}"}
        ]}}]});
        assert_eq!(extract_message_text(&parts).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_missing_or_blank_content_is_none() {
        for response in [
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": null}}]}),
            json!({"choices": [{"message": {"content": "  \n"}}]}),
            json!({}),
        ] {
            assert_eq!(extract_message_text(&response), None, "{response}");
        }
    }

    #[test]
    fn test_usage_out_of_range_is_dropped() {
        let usage = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}});
        assert_eq!(extract_usage(&usage).map(|u| u.total_tokens), Some(15));

        let huge = json!({"usage": {
            "prompt_tokens": 10,
            "completion_tokens": u64::from(u32::MAX) + 1,
            "total_tokens": 15
        }});
        assert!(extract_usage(&huge).is_none());
    }

    #[test]
    fn test_request_body_carries_response_format() {
        let body = ChatCompletionRequest::new("m", vec![json!({"role": "user", "content": "hi"})])
            .with_max_tokens(Some(64))
            .with_response_format(json!({"type": "json_schema"}))
            .into_value();
        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["response_format"]["type"], "json_schema");
    }
}
