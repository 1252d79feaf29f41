//! The turn orchestrator.
//!
//! One task owns all call state: the transcript, the session status, the
//! active transport or recognizer, and the recorder. Everything else talks to
//! it through its inbox:
//!
//! - commands from [`OrchestratorHandle`]
//! - transport events and the end of the transport reader
//! - recognizer results
//! - progress from the turn worker (reply text, completion, failure)
//! - playback idle changes
//! - timers (recognizer restart, reconnect after the settle delay)
//!
//! Inputs carry the epoch of the call that produced them. Every teardown bumps
//! the epoch, so a late event from an old channel can never touch a new one.
//!
//! ```rust,ignore
//! let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
//! let deps = OrchestratorDeps::new(scheduler)
//!     .with_duplex(Arc::new(GeminiLiveModel::new(key)))
//!     .with_capture(Arc::new(SilentCaptureDevice::new()));
//! let handle = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);
//! handle.connect(None).await?;
//! ```

mod engine;
mod turn;

use crate::capture::CaptureDevice;
use crate::config::OrchestratorConfig;
use crate::error::{RealtimeError, Result};
use crate::playback::PlaybackScheduler;
use crate::recognizer::SpeechRecognizer;
use crate::transport::DuplexModel;
use docvoice_core::{CallRecord, LanguageCode, Message, SessionStatus};
use docvoice_model::{SpeechSynthesizer, TextModel};
use docvoice_session::CallStore;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Shown when the microphone cannot be opened.
pub const PERMISSION_DENIED_REPLY: &str =
    "I couldn't access your microphone. Please allow microphone access and try again.";
/// Shown when the channel could not be opened.
pub const CONNECT_FAILED_REPLY: &str = "I couldn't connect right now. Please try again.";
/// Replaces a reply that failed mid-stream.
pub const TURN_FAILED_REPLY: &str = "Sorry, I encountered an error.";
/// Transient notice while the channel is reopened with new context.
pub const UPDATING_CONTEXT_NOTICE: &str = "Updating context…";

/// Message appended when the channel closes abnormally.
pub fn connection_closed_reply(code: u16) -> String {
    format!("Connection closed ({code}). Please reconnect to continue.")
}

/// Fine-grained call state. The last three only occur while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Connecting,
    Listening,
    Processing,
    Speaking,
}

/// Notifications for front ends.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    StatusChanged(SessionStatus),
    /// Transient text that is not part of the transcript.
    Notice(String),
    /// A finished call, already handed to the store if one is configured.
    RecordingReady(CallRecord),
    /// A text-chat reply is being generated.
    Typing(bool),
}

/// Collaborators of the orchestrator. Every one but the scheduler is optional;
/// a missing piece disables the features that need it.
pub struct OrchestratorDeps {
    pub duplex: Option<Arc<dyn DuplexModel>>,
    pub capture: Option<Arc<dyn CaptureDevice>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub text_model: Option<Arc<dyn TextModel>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub store: Option<Arc<dyn CallStore>>,
    pub scheduler: PlaybackScheduler,
}

impl OrchestratorDeps {
    pub fn new(scheduler: PlaybackScheduler) -> Self {
        Self {
            duplex: None,
            capture: None,
            recognizer: None,
            text_model: None,
            synthesizer: None,
            store: None,
            scheduler,
        }
    }

    pub fn with_duplex(mut self, duplex: Arc<dyn DuplexModel>) -> Self {
        self.duplex = Some(duplex);
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureDevice>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_text_model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text_model = Some(model);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CallStore>) -> Self {
        self.store = Some(store);
        self
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Connect { context: Option<String> },
    Disconnect,
    SendText(String),
    SetLanguage(LanguageCode),
    SwitchContext { context: Option<String> },
}

/// Starts orchestrator tasks.
pub struct VoiceOrchestrator;

impl VoiceOrchestrator {
    /// Spawn the orchestrator loop. It runs until every handle is dropped,
    /// tearing down any active call on the way out.
    pub fn spawn(config: OrchestratorConfig, deps: OrchestratorDeps) -> OrchestratorHandle {
        let (commands, command_rx) = mpsc::channel(32);
        let observers = engine::Observers::new(config.language);
        let handle = OrchestratorHandle {
            commands,
            status: observers.status.subscribe(),
            state: observers.state.subscribe(),
            transcript: observers.transcript.subscribe(),
            volume: observers.volume.subscribe(),
            language: observers.language.subscribe(),
            events: observers.events.clone(),
        };
        let engine = engine::Core::new(config, deps, observers);
        tokio::spawn(engine.run(command_rx));
        handle
    }
}

/// Cloneable control and observation handle.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    state: watch::Receiver<CallState>,
    transcript: watch::Receiver<Arc<Vec<Message>>>,
    volume: watch::Receiver<f32>,
    language: watch::Receiver<LanguageCode>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl OrchestratorHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| RealtimeError::SessionClosed)
    }

    /// Start a call, optionally with extra context appended to the system
    /// prompt. Ignored unless disconnected.
    pub async fn connect(&self, context: Option<String>) -> Result<()> {
        self.send(Command::Connect { context }).await
    }

    /// End the call. Does nothing when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    /// Typed input: into the live call when connected, otherwise a text chat.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::SendText(text.into())).await
    }

    pub async fn set_language(&self, language: LanguageCode) -> Result<()> {
        self.send(Command::SetLanguage(language)).await
    }

    /// Reopen the channel with `context` (or the recent transcript when
    /// `None`) after the settle delay.
    pub async fn switch_context(&self, context: Option<String>) -> Result<()> {
        self.send(Command::SwitchContext { context }).await
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    pub fn transcript(&self) -> Arc<Vec<Message>> {
        self.transcript.borrow().clone()
    }

    /// Input or output level in [0, 1].
    pub fn volume(&self) -> f32 {
        *self.volume.borrow()
    }

    pub fn language(&self) -> LanguageCode {
        *self.language.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CallState> {
        self.state.clone()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Arc<Vec<Message>>> {
        self.transcript.clone()
    }

    pub fn subscribe_volume(&self) -> watch::Receiver<f32> {
        self.volume.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Wait until the status equals `want`. Returns `false` if the
    /// orchestrator stopped first.
    pub async fn wait_for_status(&self, want: SessionStatus) -> bool {
        let mut rx = self.status.clone();
        rx.wait_for(|status| *status == want).await.is_ok()
    }
}
