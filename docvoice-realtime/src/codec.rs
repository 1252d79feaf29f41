//! Audio formats, PCM conversion and the helpers shared by capture and playback.
//!
//! Wire audio is 16-bit little-endian mono PCM: 16 kHz upstream, 24 kHz from
//! the model. Everything inside the process works on `f32` samples in [-1, 1].

use crate::error::{RealtimeError, Result};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sample rate of microphone frames sent upstream.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Sample rate of synthesized audio coming back from the model.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Complete audio format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16_24khz()
    }
}

impl AudioFormat {
    /// PCM16 at 24kHz, the model's output format.
    pub fn pcm16_24khz() -> Self {
        Self { sample_rate: OUTPUT_SAMPLE_RATE, channels: 1, bits_per_sample: 16 }
    }

    /// PCM16 at 16kHz, the upstream capture format.
    pub fn pcm16_16khz() -> Self {
        Self { sample_rate: INPUT_SAMPLE_RATE, channels: 1, bits_per_sample: 16 }
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample / 8) as u32
    }

    /// Duration in milliseconds for a given number of bytes.
    pub fn duration_ms(&self, bytes: usize) -> f64 {
        let bytes_per_ms = self.bytes_per_second() as f64 / 1000.0;
        bytes as f64 / bytes_per_ms
    }

    /// MIME type used on the wire, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Encoded PCM16 bytes with their format.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub data: Bytes,
    pub format: AudioFormat,
}

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self { data: data.into(), format }
    }

    pub fn duration_ms(&self) -> f64 {
        self.format.duration_ms(self.data.len())
    }

    pub fn to_base64(&self) -> String {
        bytes_to_base64(&self.data)
    }

    /// Build a chunk from i16 samples.
    pub fn from_i16_samples(samples: &[i16], format: AudioFormat) -> Self {
        Self::new(i16_to_pcm16_le_bytes(samples), format)
    }
}

/// Decoded mono audio ready to schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self { samples: samples.into(), sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Same audio at another rate; shares storage when the rate already matches.
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        if target_rate == self.sample_rate {
            return self.clone();
        }
        AudioBuffer::new(resample_linear(&self.samples, self.sample_rate, target_rate), target_rate)
    }
}

/// Receives a copy of audio flowing through capture or playback.
///
/// Implementations run on the audio path and must not block.
pub trait SampleSink: Send + Sync {
    fn write(&self, samples: &[f32], sample_rate: u32);
}

pub fn base64_to_bytes(encoded: &str) -> Result<Bytes> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(Bytes::from)
        .map_err(|e| RealtimeError::audio(format!("invalid base64 audio: {e}")))
}

pub fn bytes_to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Clamp to [-1, 1] then scale asymmetrically: negatives by 32768, positives by 32767.
pub fn float32_to_int16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
            if s < 0.0 { (s * 32768.0) as i16 } else { (s * 32767.0) as i16 }
        })
        .collect()
}

pub fn int16_to_float32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Little-endian PCM16 bytes to samples. An odd trailing byte is an error.
pub fn pcm16_le_bytes_to_i16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(RealtimeError::audio(format!(
            "invalid data length for PCM16: {} (must be even)",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]])).collect())
}

pub fn i16_to_pcm16_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Raw mono PCM16 into a playable buffer.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> Result<AudioBuffer> {
    let samples = pcm16_le_bytes_to_i16(bytes)?;
    Ok(AudioBuffer::new(int16_to_float32(&samples), sample_rate))
}

/// Linear-interpolation resampler. Good enough for speech.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let out_len = ((samples.len() as u64 * to_rate as u64) / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Linear resampler for a continuous stream delivered in blocks.
///
/// Keeps the read position and the last input sample between calls so block
/// edges interpolate like the inside of a block.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    from_rate: u32,
    to_rate: u32,
    pos: f64,
    prev: Option<f32>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self { from_rate, to_rate, pos: 0.0, prev: None }
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.from_rate == self.to_rate
            || input.is_empty()
            || self.from_rate == 0
            || self.to_rate == 0
        {
            return input.to_vec();
        }
        let step = self.from_rate as f64 / self.to_rate as f64;
        let last = (input.len() - 1) as f64;
        let mut out = Vec::with_capacity((input.len() as f64 / step) as usize + 1);
        // position -1 is the final sample of the previous block
        while self.pos <= last {
            let idx = self.pos.floor();
            let frac = (self.pos - idx) as f32;
            let idx = idx as isize;
            let a = if idx < 0 { self.prev.unwrap_or(input[0]) } else { input[idx as usize] };
            let b = input[((idx + 1).max(0) as usize).min(input.len() - 1)];
            out.push(a + (b - a) * frac);
            self.pos += step;
        }
        self.pos -= input.len() as f64;
        self.prev = input.last().copied();
        out
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev = None;
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Collects PCM16 samples and hands them out in fixed-size frames.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    buffer: Vec<i16>,
    frame_samples: usize,
}

impl FrameAccumulator {
    pub fn new(frame_samples: usize) -> Self {
        Self { buffer: Vec::with_capacity(frame_samples * 2), frame_samples: frame_samples.max(1) }
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Next complete frame, if one is buffered.
    pub fn pop_frame(&mut self) -> Option<Vec<i16>> {
        if self.buffer.len() < self.frame_samples {
            return None;
        }
        let rest = self.buffer.split_off(self.frame_samples);
        Some(std::mem::replace(&mut self.buffer, rest))
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
