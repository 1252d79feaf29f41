use async_trait::async_trait;
use docvoice_core::{CallRecord, ChatSession, Message, Result};

/// Read-back limit used by the operator views when none is given.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Length, in characters, of the running "last message" preview.
pub const PREVIEW_CHARS: usize = 100;

/// Persistence collaborator for finished calls and text chats.
///
/// The voice core only writes through this trait; how records are laid out is
/// up to the implementation.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Store a finished call: the audio under its `audio_url` plus metadata and transcript.
    async fn save_recording(&self, record: CallRecord) -> Result<()>;

    /// Append one message to a chat session, creating the session on first use.
    async fn log_chat_message(&self, session_id: &str, message: Message) -> Result<()>;

    /// Most recent calls, newest first.
    async fn recent_recordings(&self, limit: usize) -> Result<Vec<CallRecord>>;

    /// Most recently updated chat sessions, newest first.
    async fn recent_chat_sessions(&self, limit: usize) -> Result<Vec<ChatSession>>;
}

/// First [`PREVIEW_CHARS`] characters of a message.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Fold a message into an existing session, or start one.
pub(crate) fn apply_message(
    existing: Option<ChatSession>,
    session_id: &str,
    message: Message,
) -> ChatSession {
    let mut session = existing.unwrap_or_else(|| ChatSession {
        id: session_id.to_string(),
        updated_at: message.created_at,
        messages: Vec::new(),
        last_message: String::new(),
    });
    session.last_message = preview(&message.text);
    session.updated_at = chrono::Utc::now().max(message.created_at);
    session.messages.push(message);
    session
}
