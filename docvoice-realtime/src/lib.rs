//! # docvoice-realtime
//!
//! Live voice calls for the doctor-finder assistant.
//!
//! ## Architecture
//!
//! ```text
//!   microphone ──► CapturePipeline ──► DuplexSession ──► model
//!                        │                  │
//!                        ▼                  ▼
//!                 RecordingAssembler ◄── PlaybackScheduler ──► speaker
//!                        ▲                  ▲
//!                        └──── VoiceOrchestrator (one task owns it all)
//! ```
//!
//! A call runs in one of two modes:
//!
//! - **Duplex**: a persistent audio channel (Gemini Live). The server
//!   detects turns, streams spoken audio back and transcribes both sides.
//! - **Turn-based**: a local [`SpeechRecognizer`] produces one utterance, a
//!   [`TextModel`](docvoice_model::TextModel) streams the reply, and each
//!   sentence is synthesized and queued in order.
//!
//! Typed input while disconnected becomes a plain text chat.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docvoice_realtime::{
//!     OUTPUT_SAMPLE_RATE, OrchestratorConfig, OrchestratorDeps, PlaybackScheduler,
//!     VoiceOrchestrator, gemini::GeminiLiveModel,
//! };
//!
//! let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
//! let deps = OrchestratorDeps::new(scheduler)
//!     .with_duplex(Arc::new(GeminiLiveModel::new(api_key)));
//! let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);
//!
//! call.connect(None).await?;
//! let mut transcript = call.subscribe_transcript();
//! while transcript.changed().await.is_ok() {
//!     println!("{:?}", transcript.borrow().last());
//! }
//! ```

pub mod capture;
pub mod chat;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod playback;
pub mod recognizer;
pub mod recording;
pub mod segment;
pub mod transcript;
pub mod transport;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "desktop-audio")]
pub mod device;

pub use capture::{
    CaptureDevice, CaptureHandle, CapturePipeline, CaptureStream, DeviceState, SilentCaptureDevice,
};
pub use chat::{TEXT_CHAT_ERROR, TextChat};
pub use codec::{
    AudioBuffer, AudioChunk, AudioFormat, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE, SampleSink,
};
pub use config::{CallMode, CaptureConfig, OrchestratorConfig, RealtimeConfig, ScriptPolicy};
pub use error::{RealtimeError, Result};
pub use events::ServerEvent;
pub use orchestrator::{
    CallState, OrchestratorDeps, OrchestratorEvent, OrchestratorHandle, VoiceOrchestrator,
};
pub use playback::{PlaybackScheduler, RendererHandle, VolumeMeter, spawn_realtime_renderer};
pub use recognizer::{
    ChannelRecognizer, RecognizerError, RecognizerEvent, RecognizerFeeder, SpeechRecognizer,
};
pub use recording::RecordingAssembler;
pub use segment::SentenceSegmenter;
pub use transcript::Transcript;
pub use transport::{BoxedSession, DuplexModel, DuplexSession};
