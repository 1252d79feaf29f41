//! Duplex channel traits.
//!
//! A [`DuplexModel`] opens sessions; a [`DuplexSession`] carries audio frames
//! and text up and [`ServerEvent`]s down. Retry and reconnect belong to the
//! caller: a session never reopens itself.

use crate::codec::AudioChunk;
use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::events::ServerEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to an open session.
pub type BoxedSession = Arc<dyn DuplexSession>;

/// Factory for duplex sessions.
#[async_trait]
pub trait DuplexModel: Send + Sync {
    /// Provider name, for logs.
    fn provider(&self) -> &str;

    fn model_id(&self) -> &str;

    /// Open a channel and send the setup. Fails on network or auth errors.
    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession>;
}

/// A live bidirectional channel.
///
/// Sends on a closed session return `Ok(())` without doing anything.
#[async_trait]
pub trait DuplexSession: Send + Sync {
    fn session_id(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Send one PCM16 microphone frame.
    async fn send_audio_frame(&self, frame: &AudioChunk) -> Result<()>;

    /// Send typed text as a complete user turn.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Next server event. `None` once the channel has ended; a
    /// [`ServerEvent::Closed`] is always delivered first when a close frame arrived.
    async fn next_event(&self) -> Option<Result<ServerEvent>>;

    /// Close the channel. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}
