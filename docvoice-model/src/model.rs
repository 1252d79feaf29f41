use async_trait::async_trait;
use bytes::Bytes;
use docvoice_core::{Message, Result, VoiceError};
use futures::Stream;
use std::pin::Pin;

/// Incremental text tokens from a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A remote text model that answers one user turn given the prior transcript.
#[async_trait]
pub trait TextModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Single request/response completion.
    async fn generate(&self, history: &[Message], text: &str) -> Result<String>;

    /// Streaming completion. Tokens arrive in generation order.
    async fn stream(&self, history: &[Message], text: &str) -> Result<TextStream>;
}

/// Why a synthesis request produced no audio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis rate limited: {0}")]
    RateLimited(String),

    #[error("speech synthesis rejected input: {0}")]
    Rejected(String),

    #[error("speech synthesis failed: {0}")]
    Other(String),
}

impl SpeechError {
    /// Classify a failed HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let upper = body.to_ascii_uppercase();
        if status == 429 || upper.contains("RESOURCE_EXHAUSTED") {
            Self::RateLimited(format!("HTTP {status}"))
        } else if status == 400 || upper.contains("INVALID_ARGUMENT") {
            Self::Rejected(format!("HTTP {status}: {}", preview(body)))
        } else {
            Self::Other(format!("HTTP {status}: {}", preview(body)))
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<SpeechError> for VoiceError {
    fn from(err: SpeechError) -> Self {
        VoiceError::Speech(err.to_string())
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Converts short text into raw 16-bit little-endian mono PCM.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Sample rate of the PCM this synthesizer returns.
    fn sample_rate(&self) -> u32 {
        24_000
    }

    /// `Ok(None)` means the service answered but carried no audio.
    async fn synthesize(&self, text: &str) -> std::result::Result<Option<Bytes>, SpeechError>;
}
