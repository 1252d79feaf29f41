use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::transport::{BoxedSession, DuplexModel};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::session::GeminiLiveSession;
use super::{DEFAULT_MODEL, GEMINI_LIVE_URL};

/// Opens Gemini Live sessions with an AI Studio API key.
pub struct GeminiLiveModel {
    api_key: SecretString,
    model_id: String,
    endpoint: String,
}

impl GeminiLiveModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            model_id: DEFAULT_MODEL.to_string(),
            endpoint: GEMINI_LIVE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Point at another WebSocket endpoint (a proxy or a local test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key.expose_secret())
    }
}

impl std::fmt::Debug for GeminiLiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveModel")
            .field("model_id", &self.model_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DuplexModel for GeminiLiveModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession> {
        if self.api_key.expose_secret().is_empty() {
            return Err(RealtimeError::config("Gemini API key is empty"));
        }
        let model = config.model.clone().unwrap_or_else(|| self.model_id.clone());
        let session = GeminiLiveSession::connect(&self.url(), &model, config).await?;
        Ok(Arc::new(session))
    }
}
