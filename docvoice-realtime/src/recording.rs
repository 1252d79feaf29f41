//! Mixes microphone and playback audio into one call recording.

use crate::codec::{LinearResampler, OUTPUT_SAMPLE_RATE, SampleSink, float32_to_int16};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use docvoice_core::{CallRecord, Message};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Track {
    Mic,
    Playback,
}

struct ActiveRecording {
    started: Instant,
    started_at: DateTime<Utc>,
    mic: Vec<f32>,
    playback: Vec<f32>,
}

type Shared = Arc<Mutex<Option<ActiveRecording>>>;

/// Mix bus for one call.
///
/// Taps write into the bus only while a recording is active. [`finish`]
/// ends the recording at most once per [`start`].
///
/// [`start`]: Self::start
/// [`finish`]: Self::finish
#[derive(Clone)]
pub struct RecordingAssembler {
    active: Shared,
    sample_rate: u32,
    min_duration: Duration,
}

struct RecordingTap {
    active: Shared,
    track: Track,
    sample_rate: u32,
    resampler: Mutex<Option<LinearResampler>>,
}

impl SampleSink for RecordingTap {
    fn write(&self, samples: &[f32], sample_rate: u32) {
        let mut guard = self.active.lock();
        let Some(recording) = guard.as_mut() else { return };
        let mut slot = self.resampler.lock();
        if slot.as_ref().is_some_and(|r| r.from_rate() != sample_rate) {
            *slot = None;
        }
        let resampler =
            slot.get_or_insert_with(|| LinearResampler::new(sample_rate, self.sample_rate));
        let resampled = resampler.process(samples);
        match self.track {
            Track::Mic => recording.mic.extend_from_slice(&resampled),
            Track::Playback => recording.playback.extend_from_slice(&resampled),
        }
    }
}

impl RecordingAssembler {
    pub fn new(min_duration: Duration) -> Self {
        Self::with_sample_rate(OUTPUT_SAMPLE_RATE, min_duration)
    }

    pub fn with_sample_rate(sample_rate: u32, min_duration: Duration) -> Self {
        Self { active: Arc::new(Mutex::new(None)), sample_rate, min_duration }
    }

    pub fn mic_tap(&self) -> Arc<dyn SampleSink> {
        Arc::new(RecordingTap {
            active: self.active.clone(),
            track: Track::Mic,
            sample_rate: self.sample_rate,
            resampler: Mutex::new(None),
        })
    }

    pub fn playback_tap(&self) -> Arc<dyn SampleSink> {
        Arc::new(RecordingTap {
            active: self.active.clone(),
            track: Track::Playback,
            sample_rate: self.sample_rate,
            resampler: Mutex::new(None),
        })
    }

    /// Begin a new recording, discarding any unfinished one.
    pub fn start(&self) {
        let previous = self.active.lock().replace(ActiveRecording {
            started: Instant::now(),
            started_at: Utc::now(),
            mic: Vec::new(),
            playback: Vec::new(),
        });
        if previous.is_some() {
            tracing::warn!("discarding unfinished recording");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Stop recording and package the call.
    ///
    /// Returns `None` when nothing was recording, when the call lasted no
    /// longer than the minimum duration, or when encoding failed.
    pub fn finish(&self, transcript: Vec<Message>) -> Option<CallRecord> {
        let recording = self.active.lock().take()?;
        let elapsed = recording.started.elapsed();
        if elapsed <= self.min_duration {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "call too short to keep");
            return None;
        }

        let mixed = mix(&recording.mic, &recording.playback);
        match encode_wav(&mixed, self.sample_rate) {
            Ok(audio) => {
                tracing::info!(
                    duration_secs = elapsed.as_secs_f64(),
                    samples = mixed.len(),
                    messages = transcript.len(),
                    "call recording finalized"
                );
                Some(CallRecord::new(
                    audio,
                    recording.started_at,
                    elapsed.as_secs_f64(),
                    transcript,
                ))
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to encode call recording");
                None
            }
        }
    }
}

/// Sum two tracks sample by sample, padding the shorter one with silence.
fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let sum = a.get(i).copied().unwrap_or(0.0) + b.get(i).copied().unwrap_or(0.0);
            sum.clamp(-1.0, 1.0)
        })
        .collect()
}

/// Mono 16-bit PCM WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Bytes, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)?;
        for sample in float32_to_int16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(buf))
}
