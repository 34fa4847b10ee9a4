use crate::{schemas::SchemaHandle, services::GenerationRequest};
use serde_json::{json, Value};

/// Client-held conversational context for one trip.
///
/// The generation service is stateless, so the ordered user/assistant turns
/// live here and are replayed on every call.
#[derive(Clone, Debug)]
pub struct Conversation {
    system_instruction: String,
    schema: SchemaHandle,
    messages: Vec<Value>,
}

impl Conversation {
    pub fn new(system_instruction: impl Into<String>, schema: SchemaHandle) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            schema,
            messages: Vec::new(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn schema(&self) -> &SchemaHandle {
        &self.schema
    }

    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    /// Number of completed user/assistant exchanges.
    pub fn exchange_count(&self) -> usize {
        self.messages.len() / 2
    }

    /// Request for the next turn. The conversation itself is not modified;
    /// call [`Conversation::commit`] once the reply has been accepted.
    pub fn request_for(&self, user_prompt: &str) -> GenerationRequest {
        let mut messages = self.messages.clone();
        messages.push(user_message(user_prompt));
        GenerationRequest {
            system_instruction: self.system_instruction.clone(),
            schema: self.schema.clone(),
            messages,
        }
    }

    /// Record an accepted exchange.
    pub fn commit(&mut self, user_prompt: &str, reply_text: &str) {
        self.messages.push(user_message(user_prompt));
        self.messages.push(json!({
            "role": "assistant",
            "content": reply_text
        }));
    }
}

fn user_message(content: &str) -> Value {
    json!({
        "role": "user",
        "content": content
    })
}
