//! Boundary to the external text-generation service.

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::Result, schemas::SchemaHandle, types::TokenUsage};

/// Everything the service needs to produce the next reply in a conversation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Fixed instruction profile for the whole conversation
    pub system_instruction: String,
    /// Shape the reply text must conform to
    pub schema: SchemaHandle,
    /// Prior turns followed by the new user turn, as `{"role", "content"}` objects
    pub messages: Vec<Value>,
}

impl GenerationRequest {
    /// Content of the newest user turn, if any.
    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
    }
}

/// What came back from one call.
#[derive(Debug, Clone, Default)]
pub struct GenerationReply {
    /// Final text payload; `None` when the service produced nothing usable
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl GenerationReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            usage: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A request/response text generator that honours a structured-output schema.
///
/// Implementations are stateless: the whole conversation travels in every
/// [`GenerationRequest`], so the caller owns the conversational context.
#[async_trait]
pub trait GenerationService: Send + Sync + std::fmt::Debug {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationReply>;
}
