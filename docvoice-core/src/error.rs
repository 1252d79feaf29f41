#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl VoiceError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this failure ends the current connect attempt without retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;
