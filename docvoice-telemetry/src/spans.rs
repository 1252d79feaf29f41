//! Span helpers for voice-session operations.

use tracing::Span;

/// Span covering one live call, from connect to hang-up.
///
/// ```
/// use docvoice_telemetry::call_span;
/// let span = call_span("duplex", 1);
/// let _enter = span.enter();
/// ```
pub fn call_span(mode: &str, epoch: u64) -> Span {
    tracing::info_span!(
        "voice.call",
        call.mode = mode,
        call.epoch = epoch,
        session.id = tracing::field::Empty,
        otel.kind = "internal"
    )
}

/// Span for one user-utterance / model-reply exchange in turn-based mode.
pub fn turn_span(turn_id: u64) -> Span {
    tracing::info_span!("voice.turn", turn.id = turn_id, otel.kind = "internal")
}

/// Span for one remote speech-synthesis request.
pub fn synthesis_span(model_name: &str, chars: usize) -> Span {
    tracing::debug_span!(
        "speech.synthesize",
        model.name = model_name,
        text.chars = chars,
        otel.kind = "client"
    )
}

/// Span for a remote text-completion call.
pub fn model_call_span(model_name: &str) -> Span {
    tracing::info_span!("model.call", model.name = model_name, otel.kind = "client")
}

/// Record the transport session id on the current call span.
pub fn record_session_id(session_id: &str) {
    Span::current().record("session.id", session_id);
}
