//! End-to-end orchestrator behavior against in-process transports.

mod common;

use common::*;
use docvoice_core::{LanguageCode, Role, SessionStatus};
use docvoice_realtime::orchestrator::{
    CONNECT_FAILED_REPLY, PERMISSION_DENIED_REPLY, TURN_FAILED_REPLY, connection_closed_reply,
};
use docvoice_realtime::{
    CallMode, CallState, ChannelRecognizer, OUTPUT_SAMPLE_RATE, OrchestratorConfig,
    OrchestratorDeps, OrchestratorEvent, OrchestratorHandle, PlaybackScheduler, RecognizerFeeder,
    RendererHandle, ServerEvent, SilentCaptureDevice, VoiceOrchestrator, spawn_realtime_renderer,
};
use docvoice_session::{CallStore, InMemoryCallStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

fn duplex_call(model: Arc<FakeDuplex>) -> (OrchestratorHandle, PlaybackScheduler) {
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps = OrchestratorDeps::new(scheduler.clone()).with_duplex(model);
    (VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps), scheduler)
}

struct TurnCall {
    call: OrchestratorHandle,
    feeder: RecognizerFeeder,
    recognizer: Arc<ChannelRecognizer>,
    scheduler: PlaybackScheduler,
    _renderer: RendererHandle,
}

fn turn_call(model: Arc<ScriptedModel>, synth: Arc<RecordingSynth>) -> TurnCall {
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let (recognizer, feeder) = ChannelRecognizer::new();
    let recognizer = Arc::new(recognizer);
    let deps = OrchestratorDeps::new(scheduler.clone())
        .with_recognizer(recognizer.clone())
        .with_text_model(model)
        .with_synthesizer(synth);
    let config = OrchestratorConfig::default().with_mode(CallMode::TurnBased);
    TurnCall {
        call: VoiceOrchestrator::spawn(config, deps),
        feeder,
        recognizer,
        scheduler: scheduler.clone(),
        _renderer: spawn_realtime_renderer(scheduler, Duration::from_millis(20)),
    }
}

async fn wait_state(call: &OrchestratorHandle, want: CallState) {
    let mut rx = call.subscribe_state();
    timeout(WAIT, rx.wait_for(|state| *state == want))
        .await
        .expect("state timed out")
        .expect("orchestrator stopped");
}

fn model_text(messages: &[docvoice_core::Message]) -> Vec<&str> {
    messages.iter().filter(|m| m.role == Role::Model).map(|m| m.text.as_str()).collect()
}

// ── duplex ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplex_deltas_accumulate_until_turn_complete() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    assert_eq!(call.state(), CallState::Listening);

    let session = model.latest();
    session.user_says("cardiologist ");
    session.user_says("in Pune");
    session.model_says("Dr. Rao ");
    session.model_says("is available.");

    let messages = wait_transcript(&call, |m| model_text(m) == ["Dr. Rao is available."]).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, "cardiologist in Pune");
    assert!(messages[1].is_streaming);

    session.push(ServerEvent::TurnComplete);
    let messages = wait_transcript(&call, |m| m.iter().all(|m| !m.is_streaming)).await;
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn duplex_drops_user_fragments_outside_latin_script() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    let session = model.latest();
    session.user_says("मुझे डॉक्टर चाहिए");
    session.user_says("Mujhe doctor chahiye");
    session.model_says("Sure.");

    let messages = wait_transcript(&call, |m| model_text(m) == ["Sure."]).await;
    let user: Vec<_> =
        messages.iter().filter(|m| m.role == Role::User).map(|m| m.text.as_str()).collect();
    assert_eq!(user, vec!["Mujhe doctor chahiye"]);
}

#[tokio::test]
async fn duplex_interruption_flushes_playback() {
    let model = FakeDuplex::new();
    let (call, scheduler) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    let session = model.latest();
    session.model_says("Let me check the clinics near");
    session.push(ServerEvent::AudioDelta { data: pcm(1.0, OUTPUT_SAMPLE_RATE) });
    session.push(ServerEvent::AudioDelta { data: pcm(1.0, OUTPUT_SAMPLE_RATE) });
    wait_state(&call, CallState::Speaking).await;
    eventually(|| scheduler.queue_len() == 2).await;

    session.push(ServerEvent::Interrupted);
    let messages = wait_transcript(&call, |m| m.iter().all(|m| !m.is_streaming)).await;
    assert_eq!(model_text(&messages), ["Let me check the clinics near"]);
    assert_eq!(scheduler.queue_len(), 0);
    assert!(scheduler.is_idle());
    wait_state(&call, CallState::Listening).await;
}

#[tokio::test(start_paused = true)]
async fn switch_context_reopens_once_after_settling() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    let mut events = call.events();
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    let started = Instant::now();
    call.switch_context(Some("The user wants a dentist.".into())).await.unwrap();
    call.switch_context(Some("The user wants a pediatrician in Hyderabad.".into()))
        .await
        .unwrap();

    eventually(|| model.connects() == 2).await;
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    assert_eq!(model.max_open_sessions(), 1);
    assert!(model.session(0).is_closed());

    let instructions = model.instructions();
    assert!(instructions[1].contains("pediatrician in Hyderabad"));
    assert!(!instructions[1].contains("dentist"));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(model.connects(), 2);

    let mut notices = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, OrchestratorEvent::Notice(_)) {
            notices += 1;
        }
    }
    assert_eq!(notices, 1);
}

#[tokio::test(start_paused = true)]
async fn switch_context_without_context_replays_transcript() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    let session = model.latest();
    session.user_says("Looking for a neurologist in Kolkata");
    session.push(ServerEvent::TurnComplete);
    wait_transcript(&call, |m| m.len() == 1 && !m[0].is_streaming).await;

    call.switch_context(None).await.unwrap();
    eventually(|| model.connects() == 2).await;
    assert!(model.instructions()[1].contains("USER: Looking for a neurologist in Kolkata"));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.disconnect().await.unwrap();

    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    call.disconnect().await.unwrap();
    call.disconnect().await.unwrap();

    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
    eventually(|| model.latest().is_closed()).await;
    assert_eq!(model.open_sessions(), 0);
    assert_eq!(model.connects(), 1);
    eventually(|| call.state() == CallState::Idle).await;
}

#[tokio::test]
async fn abnormal_close_is_reported_in_transcript() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    model.latest().push(ServerEvent::Closed { code: 1011, reason: "internal".into() });
    let reply = connection_closed_reply(1011);
    wait_transcript(&call, |m| model_text(m) == [reply.as_str()]).await;
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
}

#[tokio::test]
async fn vanished_channel_counts_as_abnormal_close() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    model.latest().vanish();
    let reply = connection_closed_reply(1006);
    wait_transcript(&call, |m| model_text(m) == [reply.as_str()]).await;
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
}

#[tokio::test]
async fn normal_close_ends_call_quietly() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    model.latest().push(ServerEvent::Closed { code: 1000, reason: String::new() });
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
    assert!(call.transcript().is_empty());
}

#[tokio::test]
async fn refused_microphone_is_reported_and_never_connects() {
    let model = FakeDuplex::new();
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps = OrchestratorDeps::new(scheduler)
        .with_duplex(model.clone())
        .with_capture(Arc::new(SilentCaptureDevice::denied()));
    let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);

    call.connect(None).await.unwrap();
    wait_transcript(&call, |m| model_text(m) == [PERMISSION_DENIED_REPLY]).await;
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
    assert_eq!(model.connects(), 0);
}

#[tokio::test]
async fn failed_connect_is_reported() {
    let (call, _) = duplex_call(FakeDuplex::failing());
    call.connect(None).await.unwrap();
    wait_transcript(&call, |m| model_text(m) == [CONNECT_FAILED_REPLY]).await;
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
}

#[tokio::test]
async fn typed_text_goes_into_the_live_channel() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    call.send_text("Any dermatologist open on Sunday?").await.unwrap();
    call.send_text("   ").await.unwrap();
    let session = model.latest();
    eventually(|| !session.texts().is_empty()).await;
    assert_eq!(session.texts(), vec!["Any dermatologist open on Sunday?"]);
    let messages = call.transcript();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test(start_paused = true)]
async fn microphone_frames_flow_upstream_and_drive_volume() {
    let model = FakeDuplex::new();
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps = OrchestratorDeps::new(scheduler)
        .with_duplex(model.clone())
        .with_capture(Arc::new(SilentCaptureDevice::new().with_tone(0.5)));
    let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);

    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    let session = model.latest();
    eventually(|| session.frames() >= 2).await;
    eventually(|| call.volume() > 0.0).await;

    call.disconnect().await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);
    eventually(|| call.volume() == 0.0).await;
}

#[tokio::test(start_paused = true)]
async fn long_call_is_recorded_and_stored() {
    let model = FakeDuplex::new();
    let store = Arc::new(InMemoryCallStore::new());
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let _renderer = spawn_realtime_renderer(scheduler.clone(), Duration::from_millis(20));
    let deps =
        OrchestratorDeps::new(scheduler).with_duplex(model.clone()).with_store(store.clone());
    let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);
    let mut events = call.events();

    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    model.latest().model_says("Dr. Iyer is available at 5 PM.");
    wait_transcript(&call, |m| !m.is_empty()).await;
    sleep(Duration::from_millis(1500)).await;
    call.disconnect().await.unwrap();

    let record = loop {
        match timeout(WAIT, events.recv()).await.expect("no recording event").unwrap() {
            OrchestratorEvent::RecordingReady(record) => break record,
            _ => continue,
        }
    };
    assert!(record.duration_secs() > 1.0);
    assert_eq!(record.transcript().len(), 1);
    assert!(!record.transcript()[0].is_streaming);
    assert_eq!(&record.audio()[..4], b"RIFF");

    let mut stored = Vec::new();
    for _ in 0..100 {
        stored = store.recent_recordings(10).await.unwrap();
        if !stored.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stored.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn short_call_is_not_recorded() {
    let model = FakeDuplex::new();
    let store = Arc::new(InMemoryCallStore::new());
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps =
        OrchestratorDeps::new(scheduler).with_duplex(model.clone()).with_store(store.clone());
    let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);
    let mut events = call.events();

    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    sleep(Duration::from_millis(400)).await;
    call.disconnect().await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Disconnected).await);

    sleep(Duration::from_millis(100)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, OrchestratorEvent::RecordingReady(_)));
    }
    assert!(store.recent_recordings(10).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplex_language_change_reopens_with_language_note() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    call.set_language(LanguageCode::Tamil).await.unwrap();
    eventually(|| model.connects() == 2).await;
    assert_eq!(call.language(), LanguageCode::Tamil);
    assert!(model.instructions()[1].contains("Tamil (ta-IN)"));
}

#[tokio::test(start_paused = true)]
async fn language_change_during_context_switch_reaches_the_new_session() {
    let model = FakeDuplex::new();
    let (call, _) = duplex_call(model.clone());
    call.connect(None).await.unwrap();
    assert!(call.wait_for_status(SessionStatus::Connected).await);

    call.switch_context(Some("The user wants a pediatrician in Hyderabad.".into()))
        .await
        .unwrap();
    call.set_language(LanguageCode::Telugu).await.unwrap();

    eventually(|| model.connects() == 2).await;
    assert!(call.wait_for_status(SessionStatus::Connected).await);
    let instructions = model.instructions();
    assert!(instructions[1].contains("pediatrician in Hyderabad"));
    assert!(instructions[1].contains("Telugu (te-IN)"));

    sleep(Duration::from_secs(2)).await;
    assert_eq!(model.connects(), 2);
}

// ── text chat ──────────────────────────────────────────────────────────

#[tokio::test]
async fn typed_text_while_disconnected_uses_text_chat() {
    let store = Arc::new(InMemoryCallStore::new());
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps = OrchestratorDeps::new(scheduler)
        .with_text_model(ScriptedModel::new(&["Try Dr. Mehta ", "at Apollo."]))
        .with_store(store.clone());
    let call = VoiceOrchestrator::spawn(OrchestratorConfig::default(), deps);
    let mut events = call.events();

    call.send_text("Any ENT specialist in Chennai?").await.unwrap();
    let messages = wait_transcript(&call, |m| m.len() == 2).await;
    assert_eq!(messages[0].text, "Any ENT specialist in Chennai?");
    assert_eq!(messages[1].text, "Try Dr. Mehta at Apollo.");
    assert_eq!(call.status(), SessionStatus::Disconnected);

    let mut typing = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::Typing(on) = event {
            typing.push(on);
        }
    }
    assert_eq!(typing, vec![true, false]);

    let sessions = store.recent_chat_sessions(10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].messages.len(), 2);
}

// ── turn-based ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn turn_based_reply_is_spoken_sentence_by_sentence() {
    let model = ScriptedModel::new(&["Dr. Rao is ", "available. ", "Call now!"]);
    let synth = RecordingSynth::new(0.2);
    let t = turn_call(model.clone(), synth.clone());
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);
    eventually(|| t.recognizer.languages().len() == 1).await;

    t.feeder.say("Find a cardiologist");
    let messages = wait_transcript(&t.call, |m| {
        m.iter().any(|m| m.role == Role::Model && !m.is_streaming)
    })
    .await;
    assert_eq!(messages[0].text, "Find a cardiologist");
    assert_eq!(messages[1].text, "Dr. Rao is available. Call now!");
    assert_eq!(model.prompts(), vec![(0, "Find a cardiologist".to_string())]);

    eventually(|| synth.spoken().len() == 2).await;
    assert_eq!(synth.spoken(), vec!["Dr. Rao is available.", "Call now!"]);

    // listening resumes once the reply has played out
    eventually(|| t.recognizer.languages().len() == 2).await;
    wait_state(&t.call, CallState::Listening).await;
}

#[tokio::test(start_paused = true)]
async fn utterance_heard_while_reply_is_processing_is_dropped() {
    let model = ScriptedModel::paced(&["Dr. Rao ", "is available."], Duration::from_secs(1));
    let recognizer = BurstRecognizer::new(&["Find a cardiologist", "Also a dentist"]);
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let deps = OrchestratorDeps::new(scheduler.clone())
        .with_recognizer(recognizer.clone())
        .with_text_model(model.clone())
        .with_synthesizer(RecordingSynth::new(0.2));
    let config = OrchestratorConfig::default().with_mode(CallMode::TurnBased);
    let call = VoiceOrchestrator::spawn(config, deps);
    let _renderer = spawn_realtime_renderer(scheduler, Duration::from_millis(20));
    call.connect(None).await.unwrap();

    let messages = wait_transcript(&call, |m| {
        m.iter().any(|m| m.role == Role::Model && !m.is_streaming)
    })
    .await;
    let users: Vec<_> = messages.iter().filter(|m| m.role == Role::User).collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].text, "Find a cardiologist");
    assert_eq!(model.prompts(), vec![(0, "Find a cardiologist".to_string())]);

    // the next pass opens once the reply has played out
    eventually(|| recognizer.starts() == 2).await;
    sleep(Duration::from_secs(2)).await;
    assert_eq!(model.calls(), 1);
    assert_eq!(call.transcript().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn listening_waits_for_queued_audio_to_drain() {
    let model = ScriptedModel::new(&["Dr. Rao is available. ", "Call now!"]);
    let synth = RecordingSynth::new(3.0);
    let t = turn_call(model, synth.clone());
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);
    eventually(|| t.recognizer.languages().len() == 1).await;

    t.feeder.say("Find a cardiologist");
    eventually(|| synth.spoken().len() == 2).await;
    wait_transcript(&t.call, |m| m.iter().any(|m| m.role == Role::Model && !m.is_streaming))
        .await;
    assert!(!t.scheduler.is_idle());

    let started = Instant::now();
    while !t.scheduler.is_idle() {
        assert_eq!(t.recognizer.languages().len(), 1, "recognizer restarted over queued audio");
        sleep(Duration::from_millis(100)).await;
    }
    assert!(started.elapsed() >= Duration::from_secs(5));
    eventually(|| t.recognizer.languages().len() == 2).await;
    wait_state(&t.call, CallState::Listening).await;
}

#[tokio::test(start_paused = true)]
async fn rate_limited_sentence_is_shown_but_not_played() {
    let model = ScriptedModel::new(&["Dr. Rao is available."]);
    let synth = RecordingSynth::rate_limited();
    let t = turn_call(model, synth.clone());
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);
    eventually(|| t.recognizer.languages().len() == 1).await;

    let started = Instant::now();
    t.feeder.say("Find a cardiologist");
    let messages = wait_transcript(&t.call, |m| {
        m.iter().any(|m| m.role == Role::Model && !m.is_streaming)
    })
    .await;
    assert_eq!(model_text(&messages), vec!["Dr. Rao is available."]);

    while t.recognizer.languages().len() < 2 {
        assert!(t.scheduler.is_idle(), "nothing is queued for a sentence that never synthesized");
        assert!(started.elapsed() < WAIT, "listening never resumed");
        sleep(Duration::from_millis(50)).await;
    }
    // first attempt plus three retries, 1s + 2s + 4s apart
    assert_eq!(synth.spoken(), vec!["Dr. Rao is available."; 4]);
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert!(t.scheduler.is_idle());
}

#[tokio::test(start_paused = true)]
async fn failed_reply_is_replaced_with_apology() {
    let model = ScriptedModel::failing_after(&["Dr. Rao "]);
    let synth = RecordingSynth::new(0.2);
    let t = turn_call(model, synth.clone());
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);

    t.feeder.say("Find a cardiologist");
    wait_transcript(&t.call, |m| {
        m.iter().any(|m| m.role == Role::Model && !m.is_streaming && m.text == TURN_FAILED_REPLY)
    })
    .await;
    eventually(|| t.recognizer.languages().len() == 2).await;
    assert!(synth.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn typed_turn_is_dropped_while_reply_is_in_progress() {
    let model = ScriptedModel::paced(&["One moment. ", "Dr. Sen is free today."], Duration::from_secs(1));
    let synth = RecordingSynth::new(0.1);
    let t = turn_call(model.clone(), synth);
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);

    t.feeder.say("Need a gynecologist");
    wait_state(&t.call, CallState::Processing).await;
    t.call.send_text("Also a dentist").await.unwrap();

    let messages = wait_transcript(&t.call, |m| {
        m.iter().any(|m| m.role == Role::Model && !m.is_streaming)
    })
    .await;
    assert_eq!(model.calls(), 1);
    assert_eq!(messages.iter().filter(|m| m.role == Role::User).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn turn_based_language_change_restarts_recognizer() {
    let t = turn_call(ScriptedModel::new(&["Okay."]), RecordingSynth::new(0.1));
    t.call.connect(None).await.unwrap();
    assert!(t.call.wait_for_status(SessionStatus::Connected).await);
    eventually(|| t.recognizer.languages() == vec![LanguageCode::EnglishIndia]).await;

    t.call.set_language(LanguageCode::Hindi).await.unwrap();
    eventually(|| t.recognizer.languages().last() == Some(&LanguageCode::Hindi)).await;
    assert_eq!(t.call.language(), LanguageCode::Hindi);
    assert_eq!(t.call.status(), SessionStatus::Connected);
}
