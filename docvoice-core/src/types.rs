use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry.
///
/// While `is_streaming` is set the text may still grow; once cleared the
/// message is final and is never edited again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            is_streaming: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    /// An open entry that streamed text will be appended to.
    pub fn streaming(role: Role, text: impl Into<String>) -> Self {
        Self { is_streaming: true, ..Self::new(role, text) }
    }
}

/// A finished call: mixed audio plus the transcript as it stood at hang-up.
///
/// Built once by the recording assembler and handed to the persistence
/// collaborator; there are no setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    id: String,
    #[serde(skip)]
    audio: Bytes,
    audio_url: String,
    started_at: DateTime<Utc>,
    duration_secs: f64,
    transcript: Vec<Message>,
}

impl CallRecord {
    pub fn new(
        audio: Bytes,
        started_at: DateTime<Utc>,
        duration_secs: f64,
        transcript: Vec<Message>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let audio_url = format!("recordings/{id}.wav");
        Self { id, audio, audio_url, started_at, duration_secs, transcript }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encoded clip (16-bit PCM WAV).
    pub fn audio(&self) -> &Bytes {
        &self.audio
    }

    /// Storage key the clip is uploaded under.
    pub fn audio_url(&self) -> &str {
        &self.audio_url
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Copy of this record carrying audio loaded back from storage.
    pub fn with_audio(mut self, audio: Bytes) -> Self {
        self.audio = audio;
        self
    }
}

/// A logged text chat (outside any live call).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub last_message: String,
}

/// Overall live-session status. Exactly one value is authoritative at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Spoken languages offered by the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "en-IN")]
    EnglishIndia,
    #[serde(rename = "hi-IN")]
    Hindi,
    #[serde(rename = "te-IN")]
    Telugu,
    #[serde(rename = "ta-IN")]
    Tamil,
    #[serde(rename = "bn-IN")]
    Bengali,
    #[serde(rename = "mr-IN")]
    Marathi,
    #[serde(rename = "gu-IN")]
    Gujarati,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 7] = [
        Self::EnglishIndia,
        Self::Hindi,
        Self::Telugu,
        Self::Tamil,
        Self::Bengali,
        Self::Marathi,
        Self::Gujarati,
    ];

    /// BCP-47 tag handed to recognisers.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::EnglishIndia => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Telugu => "te-IN",
            Self::Tamil => "ta-IN",
            Self::Bengali => "bn-IN",
            Self::Marathi => "mr-IN",
            Self::Gujarati => "gu-IN",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Self::EnglishIndia => "English (India)",
            Self::Hindi => "Hindi",
            Self::Telugu => "Telugu",
            Self::Tamil => "Tamil",
            Self::Bengali => "Bengali",
            Self::Marathi => "Marathi",
            Self::Gujarati => "Gujarati",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for LanguageCode {
    type Err = crate::VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::VoiceError::config(format!("unsupported language tag: {s}")))
    }
}
