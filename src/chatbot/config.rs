use std::env;
use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

/// Settings for the chat-completion backend.
#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    /// FAQ-only mode when unset.
    pub api_key: Option<String>,
    pub model: String,
    pub completions_url: String,
    pub request_timeout: Duration,
}

impl ChatbotConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: env_string("OPENAI_MODEL", "gpt-3.5-turbo"),
            completions_url: env_string(
                "OPENAI_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            request_timeout: env_duration_millis("CHATBOT_TIMEOUT_MS", 15_000),
        }
    }

    /// Configuration that never leaves the process.
    pub fn faq_only() -> Self {
        Self {
            api_key: None,
            ..Self::from_env()
        }
    }
}
