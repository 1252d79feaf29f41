//! Gemini REST integration: text completion (plain and SSE streaming) and speech synthesis.

mod client;
mod config;
pub mod types;

pub use client::GeminiClient;
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_TEXT_MODEL, DEFAULT_TTS_MODEL, DEFAULT_VOICE, GeminiConfig,
    api_key_from_env,
};
