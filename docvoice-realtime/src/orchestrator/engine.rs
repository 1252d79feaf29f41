use super::turn::{TurnJob, TurnProgress};
use super::{
    CONNECT_FAILED_REPLY, CallState, Command, OrchestratorDeps, OrchestratorEvent,
    PERMISSION_DENIED_REPLY, TURN_FAILED_REPLY, UPDATING_CONTEXT_NOTICE, connection_closed_reply,
};
use crate::capture::{CaptureHandle, CapturePipeline};
use crate::chat::TextChat;
use crate::codec::{AudioChunk, OUTPUT_SAMPLE_RATE, SampleSink, decode_pcm16};
use crate::config::{CallMode, OrchestratorConfig, RealtimeConfig};
use crate::error::RealtimeError;
use crate::events::{ABNORMAL_CLOSE, NORMAL_CLOSE, ServerEvent};
use crate::playback::VolumeMeter;
use crate::recognizer::{RecognizerError, RecognizerEvent};
use crate::recording::RecordingAssembler;
use crate::transcript::Transcript;
use crate::transport::BoxedSession;
use docvoice_core::{
    LanguageCode, Message, Role, SessionStatus, build_context_prompt, compose_instruction,
};
use docvoice_model::ChatClient;
use docvoice_model::chat::EMPTY_REPLY;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Frames buffered between capture and the uplink before frames are dropped.
const UPLINK_BUFFER: usize = 64;

/// Senders behind the handle's watch receivers.
pub(crate) struct Observers {
    pub status: watch::Sender<SessionStatus>,
    pub state: watch::Sender<CallState>,
    pub transcript: watch::Sender<Arc<Vec<Message>>>,
    pub volume: Arc<watch::Sender<f32>>,
    pub language: watch::Sender<LanguageCode>,
    pub events: broadcast::Sender<OrchestratorEvent>,
}

impl Observers {
    pub fn new(language: LanguageCode) -> Self {
        Self {
            status: watch::channel(SessionStatus::Disconnected).0,
            state: watch::channel(CallState::Idle).0,
            transcript: watch::channel(Arc::new(Vec::new())).0,
            volume: Arc::new(watch::channel(0.0).0),
            language: watch::channel(language).0,
            events: broadcast::channel(64).0,
        }
    }
}

/// What a successful connect attempt hands back to the loop.
pub(crate) struct Established {
    session: Option<BoxedSession>,
    capture: Option<CaptureHandle>,
    frames: Option<mpsc::Receiver<AudioChunk>>,
}

impl Established {
    /// Release resources for an attempt that arrived after its call ended.
    fn discard(self) {
        if let Some(capture) = &self.capture {
            capture.stop();
        }
        if let Some(session) = self.session {
            tokio::spawn(async move {
                let _ = session.close().await;
            });
        }
    }
}

pub(crate) enum Input {
    Connected { epoch: u64, result: Result<Established, RealtimeError> },
    Transport { epoch: u64, event: Result<ServerEvent, RealtimeError> },
    TransportEnded { epoch: u64 },
    Recognizer { epoch: u64, pass: u64, event: RecognizerEvent },
    Turn { epoch: u64, turn: u64, progress: TurnProgress },
    PlaybackIdle { epoch: u64, idle: bool },
    ListenRestart { epoch: u64 },
    Reconnect { token: u64 },
    ChatReply(Message),
}

/// Resources and flags of the call in progress.
struct Call {
    epoch: u64,
    mode: CallMode,
    connected: bool,
    session: Option<BoxedSession>,
    capture: Option<CaptureHandle>,
    tasks: Vec<JoinHandle<()>>,
    listening: bool,
    pass: u64,
    processing: bool,
    turn: Option<u64>,
    playing: bool,
    listen_timer: bool,
    span: tracing::Span,
}

impl Call {
    fn state(&self) -> CallState {
        if !self.connected {
            CallState::Connecting
        } else if self.playing {
            CallState::Speaking
        } else if self.processing {
            CallState::Processing
        } else {
            CallState::Listening
        }
    }
}

struct PendingReconnect {
    token: u64,
    context: Option<String>,
    timer: JoinHandle<()>,
}

pub(crate) struct Core {
    config: OrchestratorConfig,
    deps: OrchestratorDeps,
    observers: Observers,
    inbox_tx: mpsc::UnboundedSender<Input>,
    inbox_rx: mpsc::UnboundedReceiver<Input>,
    transcript: Transcript,
    language: LanguageCode,
    recorder: RecordingAssembler,
    text_chat: TextChat,
    epoch: u64,
    turn_counter: u64,
    reconnect_token: u64,
    call: Option<Call>,
    pending_reconnect: Option<PendingReconnect>,
}

impl Core {
    pub fn new(config: OrchestratorConfig, deps: OrchestratorDeps, observers: Observers) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let chat = deps.text_model.clone().map(ChatClient::new);
        let text_chat = TextChat::new(chat, deps.store.clone());
        Self {
            language: config.language,
            recorder: RecordingAssembler::with_sample_rate(OUTPUT_SAMPLE_RATE, config.min_call_duration),
            config,
            deps,
            observers,
            inbox_tx,
            inbox_rx,
            transcript: Transcript::new(),
            text_chat,
            epoch: 0,
            turn_counter: 0,
            reconnect_token: 0,
            call: None,
            pending_reconnect: None,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!(mode = ?self.config.mode, "orchestrator started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                Some(input) = self.inbox_rx.recv() => self.on_input(input).await,
            }
        }
        self.cancel_reconnect();
        self.teardown();
        tracing::debug!("orchestrator stopped");
    }

    // ── observers ──────────────────────────────────────────────────────

    fn publish_transcript(&self) {
        self.observers.transcript.send_replace(self.transcript.snapshot());
    }

    fn set_status(&self, status: SessionStatus) {
        if *self.observers.status.borrow() == status {
            return;
        }
        tracing::info!(status = ?status, "session status");
        self.observers.status.send_replace(status);
        let _ = self.observers.events.send(OrchestratorEvent::StatusChanged(status));
    }

    fn refresh_state(&self) {
        let state = self.call.as_ref().map_or(CallState::Idle, Call::state);
        self.observers.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.observers.events.send(event);
    }

    fn say(&mut self, text: impl Into<String>) {
        self.transcript.append(Message::model(text));
        self.publish_transcript();
    }

    fn current_call(&mut self, epoch: u64) -> Option<&mut Call> {
        self.call.as_mut().filter(|call| call.epoch == epoch)
    }

    // ── commands ───────────────────────────────────────────────────────

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { context } => {
                self.cancel_reconnect();
                self.connect(context);
            }
            Command::Disconnect => {
                self.cancel_reconnect();
                self.teardown();
            }
            Command::SendText(text) => self.send_text(text).await,
            Command::SetLanguage(language) => self.set_language(language).await,
            Command::SwitchContext { context } => self.switch_context(context),
        }
    }

    fn connect(&mut self, context: Option<String>) {
        if self.call.is_some() {
            tracing::debug!("connect ignored: a call is already active");
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let mode = self.config.mode;
        let span = docvoice_telemetry::call_span(
            match mode {
                CallMode::Duplex => "duplex",
                CallMode::TurnBased => "turn-based",
            },
            epoch,
        );
        let instruction = compose_instruction(&self.config.system_instruction, context.as_deref());

        self.call = Some(Call {
            epoch,
            mode,
            connected: false,
            session: None,
            capture: None,
            tasks: Vec::new(),
            listening: false,
            pass: 0,
            processing: false,
            turn: None,
            playing: false,
            listen_timer: false,
            span: span.clone(),
        });
        self.set_status(SessionStatus::Connecting);
        self.refresh_state();

        match mode {
            CallMode::Duplex => self.spawn_duplex_connect(epoch, instruction, span),
            CallMode::TurnBased => {
                let _ = self.inbox_tx.send(Input::Connected {
                    epoch,
                    result: Ok(Established { session: None, capture: None, frames: None }),
                });
            }
        }
    }

    fn spawn_duplex_connect(&mut self, epoch: u64, instruction: String, span: tracing::Span) {
        let inbox = self.inbox_tx.clone();
        let Some(model) = self.deps.duplex.clone() else {
            let _ = inbox.send(Input::Connected {
                epoch,
                result: Err(RealtimeError::config("no duplex transport configured")),
            });
            return;
        };
        let device = self.deps.capture.clone();
        let capture_config = self.config.capture.clone();
        let taps: Vec<Arc<dyn SampleSink>> = vec![
            self.recorder.mic_tap(),
            Arc::new(VolumeMeter::new(self.observers.volume.clone(), capture_config.volume_gain)),
        ];
        let mut setup = RealtimeConfig::new()
            .with_instruction(instruction)
            .with_voice(self.config.voice.clone())
            .with_transcription()
            .with_search_tool(true);
        if let Some(model_id) = &self.config.live_model {
            setup = setup.with_model(model_id.clone());
        }

        let task = tokio::spawn(
            async move {
                let result = async {
                    let (frames_tx, frames_rx) = mpsc::channel(UPLINK_BUFFER);
                    let capture = match device {
                        Some(device) => {
                            Some(CapturePipeline::start(device, capture_config, frames_tx, taps).await?)
                        }
                        None => None,
                    };
                    let session = model.connect(setup).await?;
                    tracing::info!(
                        provider = model.provider(),
                        model_id = model.model_id(),
                        session_id = session.session_id(),
                        "duplex channel open"
                    );
                    Ok::<_, RealtimeError>(Established {
                        session: Some(session),
                        capture,
                        frames: Some(frames_rx),
                    })
                }
                .await;
                let _ = inbox.send(Input::Connected { epoch, result });
            }
            .instrument(span),
        );
        if let Some(call) = self.call.as_mut() {
            call.tasks.push(task);
        }
    }

    async fn send_text(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let connected = self.call.as_ref().filter(|call| call.connected).map(|call| call.mode);
        match connected {
            Some(CallMode::Duplex) => {
                self.transcript.append(Message::user(text.clone()));
                self.publish_transcript();
                let session = self.call.as_ref().and_then(|call| call.session.clone());
                if let Some(session) = session {
                    if let Err(err) = session.send_text(&text).await {
                        tracing::warn!(error = %err, "failed to send text into the call");
                    }
                }
            }
            Some(CallMode::TurnBased) => {
                if self.call.as_ref().is_some_and(|call| call.processing) {
                    tracing::debug!("typed turn dropped: a reply is still in progress");
                    return;
                }
                self.begin_turn(text);
            }
            None => {
                let history = self.transcript.history();
                let user = Message::user(text);
                self.transcript.append(user.clone());
                self.publish_transcript();
                self.emit(OrchestratorEvent::Typing(true));
                let chat = self.text_chat.clone();
                let inbox = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let reply = chat.reply(history, user).await;
                    let _ = inbox.send(Input::ChatReply(reply));
                });
            }
        }
    }

    async fn set_language(&mut self, language: LanguageCode) {
        if language == self.language {
            return;
        }
        self.language = language;
        self.observers.language.send_replace(language);
        tracing::info!(language = %language, "language changed");

        if self.pending_reconnect.is_some() {
            if self.config.mode == CallMode::Duplex {
                let base = self.pending_reconnect.as_mut().and_then(|p| p.context.take());
                let context = self.language_context(base, language);
                if let Some(pending) = self.pending_reconnect.as_mut() {
                    pending.context = Some(context);
                }
            }
            return;
        }

        let Some(call) = self.call.as_mut().filter(|call| call.connected) else {
            return;
        };
        match call.mode {
            CallMode::TurnBased => {
                if let Some(recognizer) = &self.deps.recognizer {
                    recognizer.stop();
                }
                call.listening = false;
                call.pass += 1;
                self.start_listening().await;
            }
            CallMode::Duplex => {
                let context = self.language_context(None, language);
                self.switch_context(Some(context));
            }
        }
    }

    /// `base` (or a transcript replay) followed by an instruction to answer
    /// in `language`.
    fn language_context(&self, base: Option<String>, language: LanguageCode) -> String {
        let mut context =
            base.unwrap_or_else(|| build_context_prompt(self.transcript.messages()));
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&format!(
            "The user has switched to {} ({}). Reply in that language from now on.",
            language.english_name(),
            language.as_tag()
        ));
        context
    }

    fn switch_context(&mut self, context: Option<String>) {
        let context = context.or_else(|| {
            let replay = build_context_prompt(self.transcript.messages());
            (!replay.is_empty()).then_some(replay)
        });

        if self.call.is_none() && self.pending_reconnect.is_none() {
            self.connect(context);
            return;
        }
        if self.call.is_some() {
            self.emit(OrchestratorEvent::Notice(UPDATING_CONTEXT_NOTICE.to_string()));
            self.teardown();
        }

        self.cancel_reconnect();
        self.reconnect_token += 1;
        let token = self.reconnect_token;
        let inbox = self.inbox_tx.clone();
        let delay = self.config.settle_delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(Input::Reconnect { token });
        });
        tracing::debug!(token, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.pending_reconnect = Some(PendingReconnect { token, context, timer });
    }

    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.pending_reconnect.take() {
            pending.timer.abort();
        }
    }

    /// Release everything the call holds. A no-op when no call is active.
    fn teardown(&mut self) {
        let Some(call) = self.call.take() else { return };
        self.epoch += 1;
        let _enter = call.span.enter();

        for task in call.tasks {
            task.abort();
        }
        if let Some(session) = call.session {
            tokio::spawn(async move {
                if let Err(err) = session.close().await {
                    tracing::debug!(error = %err, "close after teardown failed");
                }
            });
        }
        if let Some(capture) = call.capture {
            capture.stop();
        }
        if call.mode == CallMode::TurnBased {
            if let Some(recognizer) = &self.deps.recognizer {
                recognizer.stop();
            }
        }
        self.deps.scheduler.reset();

        self.transcript.finalize_all();
        self.publish_transcript();

        if let Some(record) = self.recorder.finish(self.transcript.messages().to_vec()) {
            if let Some(store) = self.deps.store.clone() {
                let saved = record.clone();
                tokio::spawn(async move {
                    if let Err(err) = store.save_recording(saved).await {
                        tracing::error!(error = %err, "failed to save call recording");
                    }
                });
            }
            self.emit(OrchestratorEvent::RecordingReady(record));
        }

        self.observers.volume.send_replace(0.0);
        self.set_status(SessionStatus::Disconnected);
        tracing::info!(epoch = call.epoch, "call ended");
        drop(_enter);
        self.refresh_state();
    }

    // ── inputs ─────────────────────────────────────────────────────────

    async fn on_input(&mut self, input: Input) {
        match input {
            Input::Connected { epoch, result } => self.on_connected(epoch, result).await,
            Input::Transport { epoch, event } => {
                if self.current_call(epoch).is_some() {
                    match event {
                        Ok(event) => self.on_server_event(event),
                        Err(err) => tracing::warn!(error = %err, "transport error"),
                    }
                }
            }
            Input::TransportEnded { epoch } => {
                if self.current_call(epoch).is_some() {
                    tracing::warn!("duplex channel ended without a close frame");
                    self.on_server_event(ServerEvent::Closed {
                        code: ABNORMAL_CLOSE,
                        reason: String::new(),
                    });
                }
            }
            Input::Recognizer { epoch, pass, event } => {
                let current = self.current_call(epoch).is_some_and(|call| call.pass == pass);
                if current {
                    self.on_recognizer_event(event).await;
                }
            }
            Input::Turn { epoch, turn, progress } => {
                let current = self.current_call(epoch).is_some_and(|call| call.turn == Some(turn));
                if current {
                    self.on_turn_progress(progress).await;
                }
            }
            Input::PlaybackIdle { epoch, idle } => {
                let Some(call) = self.current_call(epoch) else { return };
                call.playing = !idle;
                let turn_based = call.mode == CallMode::TurnBased;
                self.refresh_state();
                if idle && turn_based {
                    self.schedule_listen_restart();
                }
            }
            Input::ListenRestart { epoch } => {
                let Some(call) = self.current_call(epoch) else { return };
                call.listen_timer = false;
                self.start_listening().await;
            }
            Input::Reconnect { token } => {
                if self.pending_reconnect.as_ref().is_some_and(|p| p.token == token) {
                    if let Some(pending) = self.pending_reconnect.take() {
                        self.connect(pending.context);
                    }
                }
            }
            Input::ChatReply(reply) => {
                self.transcript.append(reply);
                self.publish_transcript();
                self.emit(OrchestratorEvent::Typing(false));
            }
        }
    }

    async fn on_connected(&mut self, epoch: u64, result: Result<Established, RealtimeError>) {
        if self.current_call(epoch).is_none() {
            if let Ok(established) = result {
                tracing::debug!(epoch, "discarding connection for an ended call");
                established.discard();
            }
            return;
        }

        let established = match result {
            Ok(established) => established,
            Err(err) => {
                if err.is_permission_denied() {
                    tracing::warn!(error = %err, "microphone unavailable");
                    self.say(PERMISSION_DENIED_REPLY);
                } else {
                    tracing::error!(error = %err, "failed to open call");
                    self.say(CONNECT_FAILED_REPLY);
                }
                self.teardown();
                return;
            }
        };

        self.recorder.start();
        let scheduler = self.deps.scheduler.clone();
        scheduler.add_tap(self.recorder.playback_tap());

        let inbox = self.inbox_tx.clone();
        let Some(call) = self.call.as_mut() else { return };
        call.connected = true;
        call.capture = established.capture;
        let span = call.span.clone();

        if let Some(session) = established.session {
            span.in_scope(|| docvoice_telemetry::record_session_id(session.session_id()));
            call.tasks.push(spawn_reader(epoch, session.clone(), inbox.clone(), span.clone()));
            if let Some(frames) = established.frames {
                call.tasks.push(spawn_uplink(session.clone(), frames, span.clone()));
            }
            call.session = Some(session);
        }

        if call.mode == CallMode::TurnBased {
            let gain = self.config.capture.volume_gain;
            scheduler.add_tap(Arc::new(VolumeMeter::new(self.observers.volume.clone(), gain)));
        }
        call.tasks.push(spawn_idle_monitor(epoch, scheduler, inbox));

        self.set_status(SessionStatus::Connected);
        self.refresh_state();
        if self.call.as_ref().is_some_and(|call| call.mode == CallMode::TurnBased) {
            self.start_listening().await;
        }
    }

    fn on_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SessionOpened { session_id } => {
                tracing::debug!(%session_id, "setup acknowledged");
            }
            ServerEvent::TranscriptDelta { role, text } => {
                if role == Role::User && !self.config.user_script_policy.admits(&text) {
                    tracing::debug!(chars = text.chars().count(), "dropping user fragment in unsupported script");
                    return;
                }
                self.transcript.append_delta(role, &text);
                self.publish_transcript();
            }
            ServerEvent::AudioDelta { data } => match decode_pcm16(&data, OUTPUT_SAMPLE_RATE) {
                Ok(buffer) => {
                    if self.deps.scheduler.enqueue(buffer).is_some() {
                        if let Some(call) = self.call.as_mut() {
                            call.playing = true;
                        }
                        self.refresh_state();
                    }
                }
                Err(err) => tracing::warn!(error = %err, "dropping undecodable audio chunk"),
            },
            ServerEvent::TurnComplete => {
                self.transcript.finalize_all();
                self.publish_transcript();
            }
            ServerEvent::Interrupted => {
                self.deps.scheduler.interrupt_all();
                self.transcript.finalize_role(Role::Model);
                self.publish_transcript();
                if let Some(call) = self.call.as_mut() {
                    call.playing = false;
                }
                self.refresh_state();
            }
            ServerEvent::Error { code, message } => {
                tracing::warn!(%code, %message, "server reported an error");
            }
            ServerEvent::Closed { code, reason } => {
                if code != NORMAL_CLOSE {
                    tracing::warn!(code, %reason, "duplex channel closed abnormally");
                    self.say(connection_closed_reply(code));
                } else {
                    tracing::info!("duplex channel closed");
                }
                self.teardown();
            }
            ServerEvent::Unknown => {}
        }
    }

    // ── turn-based ─────────────────────────────────────────────────────

    /// Open a recognizer pass if the call is idle: connected, not already
    /// listening, no reply in progress and nothing playing or queued.
    async fn start_listening(&mut self) {
        let Some(recognizer) = self.deps.recognizer.clone() else { return };
        let idle = self.deps.scheduler.is_idle();
        let language = self.language;
        let inbox = self.inbox_tx.clone();
        let Some(call) = self.call.as_mut() else { return };
        if call.mode != CallMode::TurnBased
            || !call.connected
            || call.listening
            || call.processing
            || call.playing
            || !idle
        {
            return;
        }

        match recognizer.start(language).await {
            Ok(mut events) => {
                call.pass += 1;
                call.listening = true;
                let (epoch, pass) = (call.epoch, call.pass);
                call.tasks.push(tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if inbox.send(Input::Recognizer { epoch, pass, event }).is_err() {
                            return;
                        }
                    }
                    let _ = inbox.send(Input::Recognizer { epoch, pass, event: RecognizerEvent::Ended });
                }));
                call.tasks.retain(|task| !task.is_finished());
                self.refresh_state();
            }
            Err(err) if err.is_permission_denied() => {
                tracing::warn!(error = %err, "speech recognition not permitted");
                self.say(PERMISSION_DENIED_REPLY);
                self.teardown();
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to start recognizer");
                self.schedule_listen_restart();
            }
        }
    }

    fn schedule_listen_restart(&mut self) {
        let delay = self.config.listen_restart_delay;
        let inbox = self.inbox_tx.clone();
        let Some(call) = self.call.as_mut() else { return };
        if call.mode != CallMode::TurnBased || call.listen_timer || call.listening {
            return;
        }
        call.listen_timer = true;
        let epoch = call.epoch;
        call.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(Input::ListenRestart { epoch });
        }));
    }

    async fn on_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Utterance(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                if self.call.as_ref().is_some_and(|call| call.processing) {
                    tracing::debug!("utterance dropped: a reply is still in progress");
                    return;
                }
                self.begin_turn(text);
            }
            RecognizerEvent::Error(RecognizerError::NoSpeech) => {}
            RecognizerEvent::Error(RecognizerError::PermissionDenied(reason)) => {
                tracing::warn!(%reason, "speech recognition not permitted");
                self.say(PERMISSION_DENIED_REPLY);
                self.teardown();
            }
            RecognizerEvent::Error(err) => tracing::warn!(error = %err, "recognizer error"),
            RecognizerEvent::Ended => {
                if let Some(call) = self.call.as_mut() {
                    call.listening = false;
                }
                self.schedule_listen_restart();
            }
        }
    }

    fn begin_turn(&mut self, text: String) {
        let generation = self.deps.scheduler.generation();
        let history = self.transcript.history();
        self.turn_counter += 1;
        let turn = self.turn_counter;

        let Some(call) = self.call.as_mut() else { return };
        if call.listening {
            if let Some(recognizer) = &self.deps.recognizer {
                recognizer.stop();
            }
            call.listening = false;
            call.pass += 1;
        }
        call.processing = true;
        call.turn = Some(turn);
        let epoch = call.epoch;
        let span = call.span.clone();

        self.transcript.append(Message::user(text.clone()));
        self.transcript.append(Message::streaming(Role::Model, ""));
        self.publish_transcript();

        let job = TurnJob {
            turn,
            history,
            text,
            model: self.deps.text_model.clone(),
            synthesizer: self.deps.synthesizer.clone(),
            scheduler: self.deps.scheduler.clone(),
            generation,
            retry: self.config.speech_retry.clone(),
            min_sentence_chars: self.config.min_sentence_chars,
            concurrency: self.config.synthesis_concurrency,
        };
        let inbox = self.inbox_tx.clone();
        let task = tokio::spawn(
            job.run(move |progress| {
                let _ = inbox.send(Input::Turn { epoch, turn, progress });
            })
            .instrument(span),
        );
        if let Some(call) = self.call.as_mut() {
            call.tasks.retain(|task| !task.is_finished());
            call.tasks.push(task);
        }
        self.refresh_state();
    }

    async fn on_turn_progress(&mut self, progress: TurnProgress) {
        match progress {
            TurnProgress::Delta(token) => {
                self.transcript.append_delta(Role::Model, &token);
                self.publish_transcript();
            }
            TurnProgress::Complete(full) => {
                if full.trim().is_empty() {
                    self.transcript.finish_with(Role::Model, EMPTY_REPLY);
                } else {
                    self.transcript.finalize_role(Role::Model);
                }
                self.publish_transcript();
            }
            TurnProgress::Failed(reason) => {
                tracing::warn!(%reason, "reply replaced with apology");
                self.transcript.finish_with(Role::Model, TURN_FAILED_REPLY);
                self.publish_transcript();
            }
            TurnProgress::Settled => {
                if let Some(call) = self.call.as_mut() {
                    call.processing = false;
                    call.turn = None;
                }
                self.refresh_state();
                self.schedule_listen_restart();
            }
        }
    }
}

fn spawn_reader(
    epoch: u64,
    session: BoxedSession,
    inbox: mpsc::UnboundedSender<Input>,
    span: tracing::Span,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            while let Some(event) = session.next_event().await {
                if inbox.send(Input::Transport { epoch, event }).is_err() {
                    return;
                }
            }
            let _ = inbox.send(Input::TransportEnded { epoch });
        }
        .instrument(span),
    )
}

fn spawn_uplink(
    session: BoxedSession,
    mut frames: mpsc::Receiver<AudioChunk>,
    span: tracing::Span,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            while let Some(frame) = frames.recv().await {
                if let Err(err) = session.send_audio_frame(&frame).await {
                    tracing::debug!(error = %err, "audio frame not sent");
                }
            }
        }
        .instrument(span),
    )
}

fn spawn_idle_monitor(
    epoch: u64,
    scheduler: crate::playback::PlaybackScheduler,
    inbox: mpsc::UnboundedSender<Input>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut idle = scheduler.subscribe_idle();
        loop {
            if idle.changed().await.is_err() {
                return;
            }
            let value = *idle.borrow_and_update();
            if inbox.send(Input::PlaybackIdle { epoch, idle: value }).is_err() {
                return;
            }
        }
    })
}
