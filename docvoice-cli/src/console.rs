use anyhow::Result;
use docvoice_core::{LanguageCode, Message, Role, SessionStatus, build_context_prompt};
use docvoice_model::{GeminiClient, GeminiConfig};
use docvoice_realtime::gemini::GeminiLiveModel;
use docvoice_realtime::{
    CallMode, ChannelRecognizer, OUTPUT_SAMPLE_RATE, OrchestratorConfig, OrchestratorDeps,
    OrchestratorEvent, OrchestratorHandle, PlaybackScheduler, RecognizerFeeder, VoiceOrchestrator,
};
use docvoice_session::CallStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[cfg(feature = "desktop-audio")]
mod audio {
    use docvoice_realtime::PlaybackScheduler;
    use docvoice_realtime::device::{CpalCaptureDevice, CpalSpeaker};
    use std::sync::Arc;

    pub type Output = CpalSpeaker;

    pub fn attach(
        deps: docvoice_realtime::OrchestratorDeps,
        scheduler: PlaybackScheduler,
    ) -> anyhow::Result<(docvoice_realtime::OrchestratorDeps, Output)> {
        let speaker = CpalSpeaker::start(scheduler)?;
        Ok((deps.with_capture(Arc::new(CpalCaptureDevice::new())), speaker))
    }
}

#[cfg(not(feature = "desktop-audio"))]
mod audio {
    use docvoice_realtime::{PlaybackScheduler, RendererHandle, SilentCaptureDevice};
    use std::sync::Arc;
    use std::time::Duration;

    pub type Output = RendererHandle;

    pub fn attach(
        deps: docvoice_realtime::OrchestratorDeps,
        scheduler: PlaybackScheduler,
    ) -> anyhow::Result<(docvoice_realtime::OrchestratorDeps, Output)> {
        tracing::info!("no audio hardware; using a silent microphone and a null speaker");
        let renderer =
            docvoice_realtime::spawn_realtime_renderer(scheduler, Duration::from_millis(20));
        Ok((deps.with_capture(Arc::new(SilentCaptureDevice::new())), renderer))
    }
}

const HELP: &str = "Commands: /lang <tag>, /context [text], /connect, /quit";

/// Run a live call until `/quit` or end of input.
pub async fn run_call(
    api_key: &str,
    store: Arc<dyn CallStore>,
    mode: CallMode,
    language: LanguageCode,
) -> Result<()> {
    let scheduler = PlaybackScheduler::new(OUTPUT_SAMPLE_RATE);
    let client = Arc::new(GeminiClient::new(GeminiConfig::new(api_key))?);
    let (recognizer, feeder) = ChannelRecognizer::new();
    let deps = OrchestratorDeps::new(scheduler.clone())
        .with_duplex(Arc::new(GeminiLiveModel::new(api_key)))
        .with_recognizer(Arc::new(recognizer))
        .with_text_model(client.clone())
        .with_synthesizer(client)
        .with_store(store);
    let (deps, _output) = audio::attach(deps, scheduler)?;

    let config = OrchestratorConfig::default().with_mode(mode).with_language(language);
    let call = VoiceOrchestrator::spawn(config, deps);
    let printer = tokio::spawn(print_updates(call.clone()));

    println!("Connecting ({mode:?}, {language})... {HELP}");
    call.connect(None).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !handle_line(&call, &feeder, mode, line).await? {
            break;
        }
    }

    call.disconnect().await?;
    let _ = tokio::time::timeout(
        Duration::from_secs(2),
        call.wait_for_status(SessionStatus::Disconnected),
    )
    .await;
    // give the recording a moment to reach the store
    tokio::time::sleep(Duration::from_millis(300)).await;
    printer.abort();
    Ok(())
}

/// Returns `false` when the user asked to leave.
async fn handle_line(
    call: &OrchestratorHandle,
    feeder: &RecognizerFeeder,
    mode: CallMode,
    line: &str,
) -> Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/quit" | "/exit" => return Ok(false),
        "/lang" => match rest.parse::<LanguageCode>() {
            Ok(language) => call.set_language(language).await?,
            Err(err) => eprintln!("{err}"),
        },
        "/context" => {
            let context = Some(rest.trim()).filter(|c| !c.is_empty()).map(str::to_string);
            call.switch_context(context).await?;
        }
        "/connect" => match call.status() {
            SessionStatus::Disconnected => {
                call.connect(reconnect_context(&call.transcript())).await?;
            }
            status => println!("[already {status:?}]"),
        },
        "/help" => println!("{HELP}"),
        _ if mode == CallMode::TurnBased && call.status() == SessionStatus::Connected => {
            feeder.say(line);
        }
        _ => call.send_text(line).await?,
    }
    Ok(true)
}

async fn print_updates(call: OrchestratorHandle) {
    let mut transcript = call.subscribe_transcript();
    let mut events = call.events();
    let mut printed = 0;
    loop {
        tokio::select! {
            changed = transcript.changed() => {
                if changed.is_err() {
                    return;
                }
                let messages = transcript.borrow_and_update().clone();
                printed = print_finished(&messages, printed);
            }
            event = events.recv() => match event {
                Ok(OrchestratorEvent::StatusChanged(status)) => println!("[{status:?}]"),
                Ok(OrchestratorEvent::Notice(notice)) => println!("[{notice}]"),
                Ok(OrchestratorEvent::RecordingReady(record)) => {
                    println!("[recorded {:.1}s call {}]", record.duration_secs(), record.id());
                }
                Ok(OrchestratorEvent::Typing(true)) => println!("..."),
                Ok(OrchestratorEvent::Typing(false)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

/// The conversation so far, replayed into a fresh session.
fn reconnect_context(messages: &[Message]) -> Option<String> {
    let context = build_context_prompt(messages);
    (!context.is_empty()).then_some(context)
}

/// Print finished messages from `from` on, stopping at the first open one.
fn print_finished(messages: &[Message], from: usize) -> usize {
    let mut printed = from.min(messages.len());
    for message in &messages[printed..] {
        if message.is_streaming {
            break;
        }
        let speaker = match message.role {
            Role::User => "you",
            Role::Model => "assistant",
        };
        println!("{speaker}> {}", message.text);
        printed += 1;
    }
    printed
}
