use thiserror::Error;

/// Every failure the planner can surface to a caller.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("The generation service returned no itinerary text")]
    EmptyResponse,

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("No active session. Please create a trip first.")]
    NoActiveSession,

    #[error("Invalid trip preferences: {0}")]
    InvalidPreferences(String),

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    #[error("A generation request is already in progress")]
    SessionBusy,

    #[error("The request was superseded before its response arrived")]
    Superseded,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Whether the user may reasonably resubmit the same request.
    ///
    /// The planner itself never retries; this only tells the presentation
    /// layer whether to offer a "try again" action.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlannerError::Transport(_)
            | PlannerError::RateLimit { .. }
            | PlannerError::Timeout(_)
            | PlannerError::EmptyResponse
            | PlannerError::SchemaViolation(_) => true,
            PlannerError::NoActiveSession
            | PlannerError::InvalidPreferences(_)
            | PlannerError::InvalidFeedback(_)
            | PlannerError::SessionBusy
            | PlannerError::Superseded
            | PlannerError::Config(_) => false,
        }
    }

    /// True when the call to the generation service could not complete.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PlannerError::Transport(_) | PlannerError::RateLimit { .. } | PlannerError::Timeout(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Transport(_) => "TRANSPORT_ERROR",
            PlannerError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            PlannerError::Timeout(_) => "TIMEOUT_ERROR",
            PlannerError::EmptyResponse => "EMPTY_RESPONSE",
            PlannerError::SchemaViolation(_) => "SCHEMA_VIOLATION",
            PlannerError::NoActiveSession => "NO_ACTIVE_SESSION",
            PlannerError::InvalidPreferences(_) => "INVALID_PREFERENCES",
            PlannerError::InvalidFeedback(_) => "INVALID_FEEDBACK",
            PlannerError::SessionBusy => "SESSION_BUSY",
            PlannerError::Superseded => "SUPERSEDED",
            PlannerError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }
}
