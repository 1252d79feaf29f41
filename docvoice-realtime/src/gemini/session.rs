use crate::codec::{AudioChunk, AudioFormat, base64_to_bytes};
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::events::{ABNORMAL_CLOSE, ServerEvent};
use crate::transport::DuplexSession;
use async_trait::async_trait;
use docvoice_core::Role;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// One client frame; exactly one field is set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<GeminiSetup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realtime_input: Option<GeminiRealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_content: Option<GeminiClientContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSetup {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiClientContent {
    turns: Vec<GeminiTurn>,
    turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiTurn {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRealtimeInput {
    media_chunks: Vec<GeminiMediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiMediaChunk {
    mime_type: String,
    data: String,
}

fn build_setup(model: &str, config: RealtimeConfig) -> GeminiClientMessage {
    let mut generation_config = json!({
        "responseModalities": config.modalities.unwrap_or_else(|| vec!["AUDIO".to_string()]),
    });
    if let Some(voice) = &config.voice {
        generation_config["speechConfig"] = json!({
            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
        });
    }
    if let Some(temp) = config.temperature {
        generation_config["temperature"] = json!(temp);
    }

    let model = if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") };

    GeminiClientMessage {
        setup: Some(GeminiSetup {
            model,
            system_instruction: config
                .instruction
                .map(|text| GeminiContent { parts: vec![GeminiPart { text }] }),
            generation_config,
            tools: config.search_tool.then(|| vec![json!({ "googleSearch": {} })]),
            input_audio_transcription: config.input_transcription.then(|| json!({})),
            output_audio_transcription: config.output_transcription.then(|| json!({})),
        }),
        ..Default::default()
    }
}

/// Map one Gemini Live server message onto provider-neutral events.
///
/// Order inside `serverContent`: interruption, input transcript, output
/// transcript, model parts, then turn completion.
pub fn translate_gemini_message(value: &Value, session_id: &str) -> Vec<ServerEvent> {
    let mut events = Vec::new();

    if value.get("setupComplete").is_some() {
        events.push(ServerEvent::SessionOpened { session_id: session_id.to_string() });
    }

    if let Some(error) = value.get("error") {
        events.push(ServerEvent::Error {
            code: error.get("code").map(|c| c.to_string()).unwrap_or_default(),
            message: error.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        });
    }

    let Some(content) = value.get("serverContent") else {
        return events;
    };

    if content.get("interrupted").and_then(Value::as_bool).unwrap_or(false) {
        events.push(ServerEvent::Interrupted);
    }

    let transcripts = [("inputTranscription", Role::User), ("outputTranscription", Role::Model)];
    for (key, role) in transcripts {
        if let Some(text) = content.get(key).and_then(|t| t.get("text")).and_then(Value::as_str) {
            if !text.is_empty() {
                events.push(ServerEvent::TranscriptDelta { role, text: text.to_string() });
            }
        }
    }

    if let Some(parts) = content.pointer("/modelTurn/parts").and_then(Value::as_array) {
        for part in parts {
            if let Some(data) = part.pointer("/inlineData/data").and_then(Value::as_str) {
                match base64_to_bytes(data) {
                    Ok(data) => events.push(ServerEvent::AudioDelta { data }),
                    Err(err) => tracing::warn!(error = %err, "dropping undecodable audio part"),
                }
                continue;
            }
            if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                continue;
            }
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                events.push(ServerEvent::TranscriptDelta { role: Role::Model, text: text.to_string() });
            }
        }
    }

    if content.get("turnComplete").and_then(Value::as_bool).unwrap_or(false) {
        events.push(ServerEvent::TurnComplete);
    }

    events
}

/// Gemini Live session.
///
/// A live call channel to Gemini over a single WebSocket.
pub struct GeminiLiveSession {
    session_id: String,
    connected: Arc<AtomicBool>,
    ended: AtomicBool,
    sender: Arc<Mutex<WsSink>>,
    receiver: Arc<Mutex<WsSource>>,
    pending: parking_lot::Mutex<VecDeque<ServerEvent>>,
}

impl GeminiLiveSession {
    /// Connect to `url` and send the setup message.
    pub async fn connect(url: &str, model: &str, config: RealtimeConfig) -> Result<Self> {
        let request = url.into_client_request().map_err(|e| {
            RealtimeError::connection(format!("bad live endpoint: {e}"))
        })?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::connection(format!("WebSocket connect error: {}", e)))?;

        let (sink, source) = stream.split();
        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            ended: AtomicBool::new(false),
            sender: Arc::new(Mutex::new(sink)),
            receiver: Arc::new(Mutex::new(source)),
            pending: parking_lot::Mutex::new(VecDeque::new()),
        };

        tracing::info!(model_id = %model, session_id = %session.session_id, "Sending setup message");
        session.send_raw(&build_setup(model, config)).await?;
        Ok(session)
    }

    async fn send_raw<T: Serialize>(&self, value: &T) -> Result<()> {
        let msg = serde_json::to_string(value)
            .map_err(|e| RealtimeError::protocol(format!("unencodable frame: {e}")))?;

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(msg.into()))
            .await
            .map_err(|e| RealtimeError::connection(format!("Send error: {}", e)))
    }

    fn mark_ended(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
    }

    fn queue_text(&self, raw: &str) -> Result<()> {
        tracing::trace!(%raw, "Gemini server message");
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RealtimeError::protocol(format!("Parse error: {}", e)))?;
        self.pending.lock().extend(translate_gemini_message(&value, &self.session_id));
        Ok(())
    }
}

#[async_trait]
impl DuplexSession for GeminiLiveSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio_frame(&self, frame: &AudioChunk) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let format = AudioFormat { sample_rate: frame.format.sample_rate, ..AudioFormat::pcm16_16khz() };
        let msg = GeminiClientMessage {
            realtime_input: Some(GeminiRealtimeInput {
                media_chunks: vec![GeminiMediaChunk {
                    mime_type: format.mime_type(),
                    data: frame.to_base64(),
                }],
            }),
            ..Default::default()
        };
        self.send_raw(&msg).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let msg = GeminiClientMessage {
            client_content: Some(GeminiClientContent {
                turns: vec![GeminiTurn {
                    role: "user".to_string(),
                    parts: vec![GeminiPart { text: text.to_string() }],
                }],
                turn_complete: true,
            }),
            ..Default::default()
        };
        self.send_raw(&msg).await
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        loop {
            if let Some(event) = self.pending.lock().pop_front() {
                return Some(Ok(event));
            }
            if self.ended.load(Ordering::SeqCst) {
                return None;
            }

            let message = {
                let mut receiver = self.receiver.lock().await;
                receiver.next().await
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = self.queue_text(&text) {
                        return Some(Err(e));
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Err(e) = self.queue_text(text) {
                            return Some(Err(e));
                        }
                    }
                    Err(e) => {
                        return Some(Err(RealtimeError::protocol(format!("binary frame is not UTF-8: {e}"))));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.mark_ended();
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (ABNORMAL_CLOSE, String::new()),
                    };
                    tracing::info!(session_id = %self.session_id, code, %reason, "Gemini session closed");
                    return Some(Ok(ServerEvent::Closed { code, reason }));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.mark_ended();
                    return Some(Err(RealtimeError::connection(format!("Receive error: {}", e))));
                }
                None => {
                    self.mark_ended();
                    return None;
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| RealtimeError::connection(format!("Close error: {}", e)))
    }
}

impl std::fmt::Debug for GeminiLiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveSession")
            .field("session_id", &self.session_id)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}
