use std::time::Duration;

use reqwest::StatusCode;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::ChatbotConfig;
use super::faq::faq_reply;

const SYSTEM_PROMPT: &str = "You are the exam-prep assistant, helping learners with exam topics, \
practice instructions, demo access, and subscriptions. Keep responses concise, supportive, and practical.";
const TEMPERATURE: f32 = 0.4;
const MAX_TOKENS: u32 = 200;

#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("chat completion HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat completion service returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("chat completion contained no reply")]
    EmptyReply,
}

/// What the learner was looking at when they asked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ChatContext {
    pub page: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub question: Option<String>,
    pub explanation: Option<String>,
}

/// Prompt sent as the user turn. Context lines are only included on the practice page.
pub fn build_prompt(message: &str, context: Option<&ChatContext>) -> String {
    let lines: Vec<String> = context
        .filter(|ctx| ctx.page.as_deref() == Some("practice"))
        .map(|ctx| {
            [
                ("Subject", &ctx.subject),
                ("Topic", &ctx.topic),
                ("Question", &ctx.question),
                ("Explanation", &ctx.explanation),
            ]
            .into_iter()
            .filter_map(|(label, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{label}: {v}"))
            })
            .collect()
        })
        .unwrap_or_default();

    if lines.is_empty() {
        format!("User: {message}")
    } else {
        format!("Context:\n{}\nUser: {message}", lines.join("\n"))
    }
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionContent>,
}

#[derive(Deserialize)]
struct CompletionContent {
    content: Option<String>,
}

/// Chat-completion client that degrades to FAQ replies on any failure.
#[derive(Debug, Clone)]
pub struct ChatbotClient {
    http: reqwest::Client,
    config: ChatbotConfig,
}

impl ChatbotClient {
    pub fn new(config: ChatbotConfig) -> Result<Self, ChatbotError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("prep-chatbot/0.1")
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatbotConfig {
        &self.config
    }

    pub async fn reply(&self, message: &str, context: Option<&ChatContext>) -> String {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return faq_reply(message).to_string();
        };

        match self.complete(api_key, message, context).await {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("chatbot: falling back to FAQ reply: {}", err);
                faq_reply(message).to_string()
            }
        }
    }

    async fn complete(
        &self,
        api_key: &str,
        message: &str,
        context: Option<&ChatContext>,
    ) -> Result<String, ChatbotError> {
        let prompt = build_prompt(message, context);
        let payload = CompletionRequest {
            model: &self.config.model,
            messages: [
                CompletionMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                CompletionMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&self.config.completions_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ChatbotError::Status { status, body });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ChatbotError::EmptyReply)
    }
}
