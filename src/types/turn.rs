use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token usage information from the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Which operation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Generate,
    Refine,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Generate => "generate",
            TurnKind::Refine => "refine",
        }
    }
}

/// One accepted request/response exchange within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub kind: TurnKind,
    /// Prompt sent to the service for this turn
    pub prompt: String,
    /// Day count of the itinerary the turn produced
    pub day_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    pub duration: Duration,
}

impl TurnRecord {
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} -> {} day(s) in {:.2}s",
            self.kind.as_str(),
            self.day_count,
            self.duration.as_secs_f64()
        );
        if let Some(tokens) = &self.tokens {
            line.push_str(&format!(
                " ({} prompt + {} completion = {} tokens)",
                tokens.prompt_tokens, tokens.completion_tokens, tokens.total_tokens
            ));
        }
        line
    }
}
