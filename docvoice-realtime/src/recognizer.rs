//! Local speech recognition for turn-based calls.

use crate::error::Result;
use async_trait::async_trait;
use docvoice_core::LanguageCode;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognizerError {
    /// The pass ended without hearing anything. Not worth reporting.
    #[error("no speech detected")]
    NoSpeech,
    #[error("speech recognition not allowed: {0}")]
    PermissionDenied(String),
    #[error("speech recognition failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A finalized utterance.
    Utterance(String),
    Error(RecognizerError),
    /// The listening pass is over.
    Ended,
}

pub type RecognizerStream = mpsc::Receiver<RecognizerEvent>;

/// One-utterance-per-pass recognizer.
///
/// Each [`start`](Self::start) opens a listening pass that yields at most
/// one utterance and then ends. A closed stream also means the pass ended.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(&self, language: LanguageCode) -> Result<RecognizerStream>;

    /// Abort the current pass, if any.
    fn stop(&self);
}

enum Feed {
    Speech(String),
    Failure(RecognizerError),
}

/// Feeds a [`ChannelRecognizer`]: lines of text stand in for speech.
#[derive(Clone)]
pub struct RecognizerFeeder {
    tx: mpsc::UnboundedSender<Feed>,
}

impl RecognizerFeeder {
    /// Queue an utterance for the current or next listening pass.
    pub fn say(&self, text: impl Into<String>) -> bool {
        self.tx.send(Feed::Speech(text.into())).is_ok()
    }

    pub fn fail(&self, error: RecognizerError) -> bool {
        self.tx.send(Feed::Failure(error)).is_ok()
    }
}

/// Recognizer driven by text fed through a [`RecognizerFeeder`].
///
/// Used by the terminal front end and by tests.
pub struct ChannelRecognizer {
    feed: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Feed>>>,
    pass: Mutex<Option<JoinHandle<()>>>,
    languages: Mutex<Vec<LanguageCode>>,
}

impl ChannelRecognizer {
    pub fn new() -> (Self, RecognizerFeeder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recognizer = Self {
            feed: Arc::new(tokio::sync::Mutex::new(rx)),
            pass: Mutex::new(None),
            languages: Mutex::new(Vec::new()),
        };
        (recognizer, RecognizerFeeder { tx })
    }

    /// Language of every pass started so far.
    pub fn languages(&self) -> Vec<LanguageCode> {
        self.languages.lock().clone()
    }

    pub fn is_listening(&self) -> bool {
        self.pass.lock().as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&self, language: LanguageCode) -> Result<RecognizerStream> {
        self.stop();
        self.languages.lock().push(language);
        let (tx, rx) = mpsc::channel(4);
        let feed = self.feed.clone();
        let task = tokio::spawn(async move {
            let item = feed.lock().await.recv().await;
            let event = match item {
                Some(Feed::Speech(text)) => RecognizerEvent::Utterance(text),
                Some(Feed::Failure(error)) => RecognizerEvent::Error(error),
                None => RecognizerEvent::Error(RecognizerError::Other("input closed".into())),
            };
            if tx.send(event).await.is_ok() {
                let _ = tx.send(RecognizerEvent::Ended).await;
            }
        });
        *self.pass.lock() = Some(task);
        tracing::debug!(language = %language, "recognizer listening");
        Ok(rx)
    }

    fn stop(&self) {
        if let Some(task) = self.pass.lock().take() {
            task.abort();
        }
    }
}
