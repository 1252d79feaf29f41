//! Gemini Live duplex transport.
//!
//! - Input audio: 16kHz mono PCM
//! - Output audio: 24kHz mono PCM
//! - Server-side turn detection; barge-in arrives as `interrupted`
//!
//! # Example
//!
//! ```rust,ignore
//! use docvoice_realtime::gemini::GeminiLiveModel;
//! use docvoice_realtime::{DuplexModel, RealtimeConfig};
//!
//! let model = GeminiLiveModel::new(std::env::var("GOOGLE_API_KEY")?);
//! let session = model
//!     .connect(RealtimeConfig::new().with_instruction("You are a helpful assistant."))
//!     .await?;
//! session.close().await?;
//! ```

mod model;
mod session;

pub use model::GeminiLiveModel;
pub use session::{GeminiLiveSession, translate_gemini_message};

/// Gemini Live API WebSocket URL.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default model for Gemini Live.
pub const DEFAULT_MODEL: &str = "models/gemini-live-2.5-flash-native-audio";

/// Prebuilt voices accepted by the Live API.
pub const GEMINI_VOICES: &[&str] = &["Puck", "Charon", "Kore", "Fenrir", "Aoede"];
