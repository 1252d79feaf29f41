//! # docvoice-core
//!
//! Shared types for the docvoice assistant: transcript messages, call records,
//! session status, language codes, the crate-spanning [`VoiceError`], and the
//! assistant persona prompt with its speech-cleaning helpers.
//!
//! Every other crate in the workspace depends on this one; it has no async or
//! I/O dependencies of its own.

pub mod error;
pub mod prompt;
pub mod types;

pub use error::{Result, VoiceError};
pub use prompt::{
    SYSTEM_INSTRUCTION, build_context_prompt, clean_text_for_speech, compose_instruction,
};
pub use types::{CallRecord, ChatSession, LanguageCode, Message, Role, SessionStatus};
