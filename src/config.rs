use std::{env, str::FromStr, time::Duration};

use crate::{
    error::{PlannerError, Result},
    services::openai_client::DEFAULT_BASE_URL,
};

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Runtime settings for talking to the generation service.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    /// Reject refinements that change the number of days.
    pub lock_day_count: bool,
}

impl PlannerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            lock_day_count: true,
        }
    }

    /// Build from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            PlannerError::Config(
                "OPENAI_API_KEY environment variable must be set before planning a trip"
                    .to_string(),
            )
        })?;

        Self::from_env_with_key(api_key)
    }

    /// Like [`PlannerConfig::from_env`], but with an API key supplied by the
    /// caller. Every other setting still comes from the environment.
    pub fn from_env_with_key(api_key: impl Into<String>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(api_key);

        if let Ok(base_url) = env::var("OPENAI_BASE_URL").or_else(|_| env::var("OPENROUTER_BASE_URL"))
        {
            config.base_url = base_url;
        }
        if let Ok(model) = env::var("WANDERPLAN_MODEL") {
            config.model = model;
        }
        if let Some(secs) = parse_var::<u64>("WANDERPLAN_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(max_tokens) = parse_var::<u32>("WANDERPLAN_MAX_TOKENS")? {
            config.max_tokens = Some(max_tokens);
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_day_count_lock(mut self, locked: bool) -> Self {
        self.lock_day_count = locked;
        self
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| PlannerError::Config(format!("{name}=`{raw}` is invalid: {err}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::new("key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(config.lock_day_count);
    }

    #[test]
    fn test_builder_overrides() {
        let config = PlannerConfig::new("key")
            .with_model("openai/gpt-4.1-mini")
            .with_base_url("http://localhost:8080/v1")
            .with_timeout(Duration::from_secs(5))
            .with_max_tokens(None)
            .with_day_count_lock(false);
        assert_eq!(config.model, "openai/gpt-4.1-mini");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.max_tokens, None);
        assert!(!config.lock_day_count);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("WANDERPLAN_TEST_PARSE_VAR", "soon");
        let err = parse_var::<u64>("WANDERPLAN_TEST_PARSE_VAR").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        env::remove_var("WANDERPLAN_TEST_PARSE_VAR");
        assert!(parse_var::<u64>("WANDERPLAN_TEST_PARSE_VAR").unwrap().is_none());
    }
}
