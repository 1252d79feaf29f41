use crate::service::{CallStore, apply_message};
use async_trait::async_trait;
use docvoice_core::{CallRecord, ChatSession, Message, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local store, for tests and for runs without a data directory.
#[derive(Clone, Default)]
pub struct InMemoryCallStore {
    recordings: Arc<RwLock<Vec<CallRecord>>>,
    chats: Arc<RwLock<HashMap<String, ChatSession>>>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording_count(&self) -> usize {
        self.recordings.read().len()
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn save_recording(&self, record: CallRecord) -> Result<()> {
        tracing::debug!(record_id = record.id(), duration = record.duration_secs(), "recording stored");
        self.recordings.write().push(record);
        Ok(())
    }

    async fn log_chat_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut chats = self.chats.write();
        let existing = chats.remove(session_id);
        chats.insert(session_id.to_string(), apply_message(existing, session_id, message));
        Ok(())
    }

    async fn recent_recordings(&self, limit: usize) -> Result<Vec<CallRecord>> {
        let mut records = self.recordings.read().clone();
        records.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        records.truncate(limit);
        Ok(records)
    }

    async fn recent_chat_sessions(&self, limit: usize) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self.chats.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}
