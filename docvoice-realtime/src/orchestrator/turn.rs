//! One turn-based reply: stream text, split it into sentences, synthesize
//! each sentence and queue the audio in order.

use crate::codec::decode_pcm16;
use crate::playback::PlaybackScheduler;
use crate::segment::{SentenceSegmenter, speakable};
use docvoice_core::{Message, Result, VoiceError};
use docvoice_model::{RetryConfig, SpeechSynthesizer, TextModel, synthesize_with_retry};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::Instrument;

/// Progress reported back to the orchestrator.
#[derive(Debug)]
pub(crate) enum TurnProgress {
    Delta(String),
    /// The text stream ended normally with this full reply.
    Complete(String),
    Failed(String),
    /// All sentence audio has been queued (or given up on).
    Settled,
}

pub(crate) struct TurnJob {
    pub turn: u64,
    pub history: Vec<Message>,
    pub text: String,
    pub model: Option<Arc<dyn TextModel>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub scheduler: PlaybackScheduler,
    pub generation: u64,
    pub retry: RetryConfig,
    pub min_sentence_chars: usize,
    pub concurrency: usize,
}

impl TurnJob {
    /// Run to completion, reporting through `report`. Dropping the future
    /// abandons the turn.
    pub async fn run(self, report: impl Fn(TurnProgress) + Send + Sync) {
        let span = docvoice_telemetry::turn_span(self.turn);
        let (sentence_tx, sentence_rx) = mpsc::unbounded_channel::<String>();

        let Self {
            history,
            text,
            model,
            synthesizer,
            scheduler,
            generation,
            retry,
            min_sentence_chars,
            concurrency,
            ..
        } = self;

        let report = &report;
        let producer = async move {
            let result =
                stream_reply(model, &history, &text, min_sentence_chars, sentence_tx, report).await;
            match result {
                Ok(full) => report(TurnProgress::Complete(full)),
                Err(err) => {
                    tracing::error!(error = %err, "reply stream failed");
                    report(TurnProgress::Failed(err.to_string()));
                }
            }
        };

        let speaker = async move {
            let Some(synthesizer) = synthesizer else {
                let mut sentences = sentence_rx;
                while sentences.recv().await.is_some() {}
                return;
            };
            let sample_rate = synthesizer.sample_rate();
            UnboundedReceiverStream::new(sentence_rx)
                .map(|sentence| {
                    let synthesizer = synthesizer.clone();
                    let retry = retry.clone();
                    async move { synthesize_with_retry(synthesizer.as_ref(), &sentence, &retry).await }
                })
                .buffered(concurrency.max(1))
                .for_each(|audio| {
                    let scheduler = scheduler.clone();
                    async move {
                        let Some(pcm) = audio else { return };
                        match decode_pcm16(&pcm, sample_rate) {
                            Ok(buffer) => {
                                if scheduler.enqueue_for(generation, buffer).is_none() {
                                    tracing::debug!("sentence audio dropped after interruption");
                                }
                            }
                            Err(err) => tracing::warn!(error = %err, "undecodable sentence audio"),
                        }
                    }
                })
                .await;
        };

        async {
            futures::join!(producer, speaker);
            report(TurnProgress::Settled);
        }
        .instrument(span)
        .await;
    }
}

async fn stream_reply(
    model: Option<Arc<dyn TextModel>>,
    history: &[Message],
    text: &str,
    min_sentence_chars: usize,
    sentences: mpsc::UnboundedSender<String>,
    report: &(impl Fn(TurnProgress) + Send + Sync),
) -> Result<String> {
    let model = model.ok_or_else(|| VoiceError::config("no text model configured"))?;
    let mut tokens = model.stream(history, text).await?;
    let mut segmenter = SentenceSegmenter::new();
    let mut full = String::new();

    let emit = |sentence: String| {
        if let Some(speech) = speakable(&sentence, min_sentence_chars) {
            tracing::debug!(chars = speech.chars().count(), "sentence ready for synthesis");
            let _ = sentences.send(speech);
        }
    };

    while let Some(token) = tokens.next().await {
        let token = token?;
        if token.is_empty() {
            continue;
        }
        full.push_str(&token);
        report(TurnProgress::Delta(token.clone()));
        for sentence in segmenter.push(&token) {
            emit(sentence);
        }
    }
    if let Some(rest) = segmenter.finish() {
        emit(rest);
    }
    Ok(full)
}
