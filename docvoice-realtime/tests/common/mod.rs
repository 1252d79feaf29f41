//! In-process collaborators for orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use docvoice_core::{LanguageCode, Message, Result as VoiceResult, VoiceError};
use docvoice_model::{SpeechError, SpeechSynthesizer, TextModel, TextStream};
use docvoice_realtime::codec::{float32_to_int16, i16_to_pcm16_le_bytes};
use docvoice_realtime::recognizer::RecognizerStream;
use docvoice_realtime::{
    AudioChunk, BoxedSession, DuplexModel, DuplexSession, OrchestratorHandle, RealtimeConfig,
    RealtimeError, RecognizerEvent, ServerEvent, SpeechRecognizer,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(10);

/// Wait until the published transcript satisfies `pred`.
pub async fn wait_transcript(
    handle: &OrchestratorHandle,
    pred: impl Fn(&[Message]) -> bool,
) -> Vec<Message> {
    let mut rx = handle.subscribe_transcript();
    let result = tokio::time::timeout(WAIT, rx.wait_for(|messages| pred(messages.as_slice()))).await;
    let snapshot = result.expect("transcript condition timed out").expect("orchestrator stopped");
    snapshot.to_vec()
}

/// Poll `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition timed out");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// `secs` seconds of a quiet tone as 16-bit PCM.
pub fn pcm(secs: f32, sample_rate: u32) -> Bytes {
    let len = (secs * sample_rate as f32) as usize;
    let samples: Vec<f32> = (0..len).map(|i| 0.1 * (i as f32 * 0.05).sin()).collect();
    Bytes::from(i16_to_pcm16_le_bytes(&float32_to_int16(&samples)))
}

// ── duplex ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct DuplexCounters {
    connects: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Duplex model whose sessions are driven by the test.
#[derive(Default)]
pub struct FakeDuplex {
    counters: Arc<DuplexCounters>,
    fail: AtomicBool,
    configs: Mutex<Vec<RealtimeConfig>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeDuplex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let model = Self::default();
        model.fail.store(true, Ordering::SeqCst);
        Arc::new(model)
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Sessions open right now.
    pub fn open_sessions(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Most sessions that were ever open at the same time.
    pub fn max_open_sessions(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    pub fn instructions(&self) -> Vec<String> {
        self.configs.lock().iter().map(|c| c.instruction.clone().unwrap_or_default()).collect()
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        self.sessions.lock()[index].clone()
    }

    pub fn latest(&self) -> Arc<FakeSession> {
        self.sessions.lock().last().cloned().expect("no session was opened")
    }
}

#[async_trait]
impl DuplexModel for FakeDuplex {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_id(&self) -> &str {
        "fake-live"
    }

    async fn connect(&self, config: RealtimeConfig) -> docvoice_realtime::Result<BoxedSession> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::connection("refused"));
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(open, Ordering::SeqCst);
        self.configs.lock().push(config);

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(FakeSession {
            id: format!("fake-{}", self.connects()),
            counters: self.counters.clone(),
            server: Mutex::new(Some(tx)),
            events: tokio::sync::Mutex::new(rx),
            texts: Mutex::new(Vec::new()),
            frames: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

pub struct FakeSession {
    id: String,
    counters: Arc<DuplexCounters>,
    server: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
    texts: Mutex<Vec<String>>,
    frames: AtomicUsize,
    closed: AtomicBool,
}

impl FakeSession {
    /// Deliver an event as if the server sent it.
    pub fn push(&self, event: ServerEvent) {
        if let Some(tx) = self.server.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn model_says(&self, text: &str) {
        self.push(ServerEvent::TranscriptDelta { role: docvoice_core::Role::Model, text: text.into() });
    }

    pub fn user_says(&self, text: &str) {
        self.push(ServerEvent::TranscriptDelta { role: docvoice_core::Role::User, text: text.into() });
    }

    /// Drop the connection without a close frame.
    pub fn vanish(&self) {
        self.server.lock().take();
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DuplexSession for FakeSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    async fn send_audio_frame(&self, _frame: &AudioChunk) -> docvoice_realtime::Result<()> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> docvoice_realtime::Result<()> {
        self.texts.lock().push(text.to_string());
        Ok(())
    }

    async fn next_event(&self) -> Option<docvoice_realtime::Result<ServerEvent>> {
        self.events.lock().await.recv().await.map(Ok)
    }

    async fn close(&self) -> docvoice_realtime::Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ── turn-based ─────────────────────────────────────────────────────────

/// Text model that streams a fixed list of tokens, one every `pace`.
pub struct ScriptedModel {
    tokens: Vec<VoiceResult<String>>,
    reply: String,
    pace: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(usize, String)>>,
}

impl ScriptedModel {
    pub fn new(tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: tokens.iter().map(|t| Ok(t.to_string())).collect(),
            reply: tokens.concat(),
            pace: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Streams `tokens`, then fails.
    pub fn failing_after(tokens: &[&str]) -> Arc<Self> {
        let mut tokens: Vec<VoiceResult<String>> =
            tokens.iter().map(|t| Ok(t.to_string())).collect();
        tokens.push(Err(VoiceError::model("stream reset")));
        Arc::new(Self {
            tokens,
            reply: String::new(),
            pace: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn paced(tokens: &[&str], pace: Duration) -> Arc<Self> {
        let mut model = Arc::into_inner(Self::new(tokens)).expect("fresh model");
        model.pace = pace;
        Arc::new(model)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// History length and user text of every request.
    pub fn prompts(&self) -> Vec<(usize, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, history: &[Message], text: &str) -> VoiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push((history.len(), text.to_string()));
        Ok(self.reply.clone())
    }

    async fn stream(&self, history: &[Message], text: &str) -> VoiceResult<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push((history.len(), text.to_string()));
        let tokens: Vec<VoiceResult<String>> = self
            .tokens
            .iter()
            .map(|t| match t {
                Ok(token) => Ok(token.clone()),
                Err(err) => Err(VoiceError::model(err.to_string())),
            })
            .collect();
        let pace = self.pace;
        Ok(Box::pin(async_stream::stream! {
            for token in tokens {
                if !pace.is_zero() {
                    tokio::time::sleep(pace).await;
                }
                yield token;
            }
        }))
    }
}

/// Returns `clip` seconds of audio per sentence and records what it spoke.
pub struct RecordingSynth {
    clip: f32,
    limited: bool,
    spoken: Mutex<Vec<String>>,
}

impl RecordingSynth {
    pub fn new(clip: f32) -> Arc<Self> {
        Arc::new(Self { clip, limited: false, spoken: Mutex::new(Vec::new()) })
    }

    /// Answers every request with a rate-limit error.
    pub fn rate_limited() -> Arc<Self> {
        Arc::new(Self { clip: 0.0, limited: true, spoken: Mutex::new(Vec::new()) })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynth {
    async fn synthesize(&self, text: &str) -> Result<Option<Bytes>, SpeechError> {
        self.spoken.lock().push(text.to_string());
        if self.limited {
            return Err(SpeechError::RateLimited("HTTP 429".into()));
        }
        Ok(Some(pcm(self.clip, 24_000)))
    }
}

/// Recognizer whose first pass delivers several utterances back to back;
/// later passes stay open without hearing anything.
pub struct BurstRecognizer {
    first: Mutex<Option<Vec<String>>>,
    starts: AtomicUsize,
    open: Mutex<Vec<mpsc::Sender<RecognizerEvent>>>,
}

impl BurstRecognizer {
    pub fn new(utterances: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            first: Mutex::new(Some(utterances.iter().map(|u| u.to_string()).collect())),
            starts: AtomicUsize::new(0),
            open: Mutex::new(Vec::new()),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for BurstRecognizer {
    async fn start(&self, _language: LanguageCode) -> docvoice_realtime::Result<RecognizerStream> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        match self.first.lock().take() {
            Some(utterances) => {
                for text in utterances {
                    let _ = tx.try_send(RecognizerEvent::Utterance(text));
                }
                let _ = tx.try_send(RecognizerEvent::Ended);
            }
            None => self.open.lock().push(tx),
        }
        Ok(rx)
    }

    fn stop(&self) {}
}
