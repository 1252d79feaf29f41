//! Typed messages sent while no call is connected.

use docvoice_core::Message;
use docvoice_model::ChatClient;
use docvoice_session::CallStore;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::Arc;

/// Reply shown when no chat model is available.
pub const TEXT_CHAT_ERROR: &str = "Sorry, I encountered an error. Please try again.";

/// `session_<millis>_<9 random chars>`, one per process.
pub fn new_text_session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("session_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Request/response chat with every message logged under one session id.
#[derive(Clone)]
pub struct TextChat {
    client: Option<ChatClient>,
    store: Option<Arc<dyn CallStore>>,
    session_id: String,
}

impl TextChat {
    pub fn new(client: Option<ChatClient>, store: Option<Arc<dyn CallStore>>) -> Self {
        Self { client, store, session_id: new_text_session_id() }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Log `user`, ask the model with `history` as context, log and return
    /// the reply. Store failures are logged and otherwise ignored.
    pub async fn reply(&self, history: Vec<Message>, user: Message) -> Message {
        self.log(user.clone()).await;
        let Some(client) = &self.client else {
            tracing::error!("no chat model configured");
            return Message::model(TEXT_CHAT_ERROR);
        };
        let reply = Message::model(client.send(&history, &user.text).await);
        self.log(reply.clone()).await;
        reply
    }

    async fn log(&self, message: Message) {
        let Some(store) = &self.store else { return };
        if let Err(err) = store.log_chat_message(&self.session_id, message).await {
            tracing::warn!(session_id = %self.session_id, error = %err, "failed to log chat message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = new_text_session_id();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_without_model_replies_with_error() {
        let store = Arc::new(docvoice_session::InMemoryCallStore::new());
        let chat = TextChat::new(None, Some(store.clone()));
        let reply = chat.reply(vec![], Message::user("hi")).await;
        assert_eq!(reply.text, TEXT_CHAT_ERROR);
        let sessions = store.recent_chat_sessions(10).await.unwrap();
        assert_eq!(sessions[0].messages.len(), 1);
    }
}
