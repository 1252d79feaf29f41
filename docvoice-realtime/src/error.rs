use docvoice_core::VoiceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Failures inside a live call: the duplex channel, audio devices and the
/// orchestrator itself.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// The duplex channel could not be opened or dropped mid-call.
    #[error("duplex channel connection failed: {0}")]
    ConnectionError(String),

    /// A frame that could not be built or understood.
    #[error("duplex protocol error: {0}")]
    ProtocolError(String),

    /// The orchestrator task has stopped; commands can no longer be delivered.
    #[error("call orchestrator has shut down")]
    SessionClosed,

    #[error("invalid call configuration: {0}")]
    ConfigError(String),

    /// Malformed PCM, e.g. an odd byte count.
    #[error("bad audio data: {0}")]
    AudioFormatError(String),

    /// Microphone access was refused. Never retried.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device error: {0}")]
    CaptureError(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed JSON frame: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl RealtimeError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::AudioFormatError(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureError(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

impl From<RealtimeError> for VoiceError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::PermissionDenied(msg) => VoiceError::PermissionDenied(msg),
            RealtimeError::CaptureError(msg) => VoiceError::Capture(msg),
            RealtimeError::ConfigError(msg) => VoiceError::Config(msg),
            RealtimeError::IoError(err) => VoiceError::Io(err),
            RealtimeError::SerializationError(err) => VoiceError::Serde(err),
            other => VoiceError::Transport(other.to_string()),
        }
    }
}
