use crate::service::{CallStore, apply_message};
use async_trait::async_trait;
use bytes::Bytes;
use docvoice_core::{CallRecord, ChatSession, Message, Result, VoiceError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Store backed by a directory:
///
/// ```text
/// <root>/recordings/<id>.wav    audio clip (the record's audio_url)
/// <root>/recordings/<id>.json   metadata and transcript
/// <root>/chats/<session>.json   chat session log
/// ```
pub struct DirCallStore {
    root: PathBuf,
    chat_lock: Mutex<()>,
}

impl DirCallStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("recordings")).await?;
        tokio::fs::create_dir_all(root.join("chats")).await?;
        Ok(Self { root, chat_lock: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chat_path(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(VoiceError::store(format!("invalid chat session id: {session_id:?}")));
        }
        Ok(self.root.join("chats").join(format!("{session_id}.json")))
    }

    async fn read_json_dir<T: serde::de::DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>> {
        let mut entries = tokio::fs::read_dir(self.root.join(dir)).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read(&path).await?;
            match serde_json::from_slice(&raw) {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable entry")
                }
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl CallStore for DirCallStore {
    async fn save_recording(&self, record: CallRecord) -> Result<()> {
        let audio_path = self.root.join(record.audio_url());
        tokio::fs::write(&audio_path, record.audio()).await?;
        let meta_path = audio_path.with_extension("json");
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&record)?).await?;
        tracing::info!(
            record_id = record.id(),
            duration = record.duration_secs(),
            path = %audio_path.display(),
            "call recording saved"
        );
        Ok(())
    }

    async fn log_chat_message(&self, session_id: &str, message: Message) -> Result<()> {
        let path = self.chat_path(session_id)?;
        let _guard = self.chat_lock.lock().await;
        let existing = match tokio::fs::read(&path).await {
            Ok(raw) => Some(serde_json::from_slice::<ChatSession>(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let session = apply_message(existing, session_id, message);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&session)?).await?;
        Ok(())
    }

    async fn recent_recordings(&self, limit: usize) -> Result<Vec<CallRecord>> {
        let mut records: Vec<CallRecord> = self.read_json_dir("recordings").await?;
        records.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        records.truncate(limit);

        let mut loaded = Vec::with_capacity(records.len());
        for record in records {
            let audio = match tokio::fs::read(self.root.join(record.audio_url())).await {
                Ok(audio) => Bytes::from(audio),
                Err(err) => {
                    tracing::warn!(record_id = record.id(), error = %err, "recording audio missing");
                    Bytes::new()
                }
            };
            loaded.push(record.with_audio(audio));
        }
        Ok(loaded)
    }

    async fn recent_chat_sessions(&self, limit: usize) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self.read_json_dir("chats").await?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        Ok(sessions)
    }
}
