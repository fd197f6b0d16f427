//! Learner help chat: FAQ keyword replies with an optional LLM backend.

pub mod client;
pub mod config;
pub mod faq;

pub use client::{ChatContext, ChatbotClient, ChatbotError};
pub use config::ChatbotConfig;
