//! # docvoice-model
//!
//! Remote model access for docvoice: the [`TextModel`] and [`SpeechSynthesizer`]
//! seams, the Gemini REST implementation of both, the fallback-string
//! [`ChatClient`], and bounded exponential-backoff retry.

pub mod chat;
pub mod gemini;
pub mod model;
pub mod retry;

pub use chat::ChatClient;
pub use gemini::{GeminiClient, GeminiConfig};
pub use model::{SpeechError, SpeechSynthesizer, TextModel, TextStream};
pub use retry::{RetryConfig, execute_with_retry, synthesize_with_retry};
