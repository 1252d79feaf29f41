//! Events emitted by a duplex session.

use base64::Engine;
use bytes::Bytes;
use docvoice_core::Role;
use serde::{Deserialize, Serialize};

fn deserialize_audio_bytes<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(&s)
        .map(Bytes::from)
        .map_err(serde::de::Error::custom)
}

fn serialize_audio_bytes<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let s = base64::engine::general_purpose::STANDARD.encode(bytes);
    serializer.serialize_str(&s)
}

/// Provider-neutral server event.
///
/// One provider message may map to several of these, emitted in the order
/// they appeared in the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The server accepted the setup; the channel is live.
    SessionOpened { session_id: String },

    /// A partial transcript for one role, in arrival order.
    TranscriptDelta { role: Role, text: String },

    /// Raw PCM16 audio from the model (24 kHz mono).
    AudioDelta {
        #[serde(serialize_with = "serialize_audio_bytes", deserialize_with = "deserialize_audio_bytes")]
        data: Bytes,
    },

    /// The model finished its turn.
    TurnComplete,

    /// The user barged in; pending model audio must be dropped.
    Interrupted,

    /// Error reported by the server.
    Error { code: String, message: String },

    /// The channel closed. 1000 is a normal close.
    Closed { code: u16, reason: String },

    #[serde(other)]
    Unknown,
}

/// Normal WebSocket close code.
pub const NORMAL_CLOSE: u16 = 1000;
/// Reported when the channel ended without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

impl ServerEvent {
    pub fn is_abnormal_close(&self) -> bool {
        matches!(self, Self::Closed { code, .. } if *code != NORMAL_CLOSE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_delta_serializes_as_base64() {
        let event = ServerEvent::AudioDelta { data: Bytes::from_static(&[0, 1, 2]) };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "audio_delta");
        assert_eq!(json["data"], "AAEC");
        let back: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_unknown_type() {
        let event: ServerEvent = serde_json::from_str(r#"{"type":"go_away"}"#).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_abnormal_close() {
        assert!(ServerEvent::Closed { code: 1011, reason: String::new() }.is_abnormal_close());
        assert!(!ServerEvent::Closed { code: 1000, reason: String::new() }.is_abnormal_close());
        assert!(!ServerEvent::TurnComplete.is_abnormal_close());
    }
}
