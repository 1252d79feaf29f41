//! Desktop microphone and speaker through cpal.
//!
//! `cpal::Stream` is not `Send`, so each stream lives on its own thread and
//! is dropped there when the owner signals stop.

use crate::capture::{CaptureDevice, CaptureStream, DeviceState};
use crate::config::CaptureConfig;
use crate::error::{RealtimeError, Result};
use crate::playback::PlaybackScheduler;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Keeps a stream thread alive until stopped or dropped.
struct StreamThread {
    stop: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Run `build` on a fresh thread and wait for it to report success.
    fn spawn<F>(name: &str, build: F) -> Result<Self>
    where
        F: FnOnce() -> Result<cpal::Stream> + Send + 'static,
    {
        let (stop, stop_rx) = std_mpsc::channel::<()>();
        let (started_tx, started_rx) = std_mpsc::channel::<Result<()>>();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok(stream) => {
                    let _ = started_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = started_tx.send(Err(err));
                }
            })?;

        match started_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => Ok(Self { stop, thread: Some(thread) }),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                let _ = stop.send(());
                Err(RealtimeError::Timeout(format!("{name} did not start")))
            }
        }
    }

    fn stop(&mut self) {
        let _ = self.stop.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The host's default input device.
pub struct CpalCaptureDevice {
    stream: Mutex<Option<StreamThread>>,
}

impl Default for CpalCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalCaptureDevice {
    pub fn new() -> Self {
        Self { stream: Mutex::new(None) }
    }

    /// Names of the available input devices.
    pub fn input_devices() -> Result<Vec<String>> {
        let devices = cpal::default_host()
            .input_devices()
            .map_err(|e| RealtimeError::capture(e.to_string()))?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }
}

fn open_input(tx: mpsc::Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| RealtimeError::permission_denied("no input device available"))?;
    let supported =
        device.default_input_config().map_err(|e| RealtimeError::capture(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels,
        "opening input device"
    );

    let on_error = |err: cpal::StreamError| tracing::warn!(error = %err, "input stream error");
    let stream = match format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.try_send(downmix(data, channels, |s| s));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = tx.try_send(downmix(data, channels, |s| s as f32 / 32768.0));
            },
            on_error,
            None,
        ),
        other => {
            return Err(RealtimeError::audio(format!("unsupported input sample format {other:?}")));
        }
    }
    .map_err(|e| RealtimeError::capture(e.to_string()))?;
    stream.play().map_err(|e| RealtimeError::capture(e.to_string()))?;
    Ok((stream, sample_rate))
}

fn downmix<T: Copy>(data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) -> Vec<f32> {
    let channels = channels.max(1);
    data.chunks(channels)
        .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32)
        .collect()
}

#[async_trait]
impl CaptureDevice for CpalCaptureDevice {
    async fn open(&self, _config: &CaptureConfig) -> Result<CaptureStream> {
        self.stop();
        let (tx, rx) = mpsc::channel(64);
        let (rate_tx, rate_rx) = std_mpsc::channel();
        let thread = tokio::task::spawn_blocking(move || {
            StreamThread::spawn("docvoice-capture", move || {
                let (stream, rate) = open_input(tx)?;
                let _ = rate_tx.send(rate);
                Ok(stream)
            })
        })
        .await
        .map_err(|e| RealtimeError::capture(e.to_string()))??;
        let sample_rate = rate_rx.recv().map_err(|e| RealtimeError::capture(e.to_string()))?;
        *self.stream.lock() = Some(thread);
        Ok(CaptureStream { sample_rate, samples: rx })
    }

    fn state(&self) -> DeviceState {
        if self.stream.lock().is_some() { DeviceState::Running } else { DeviceState::Closed }
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {
        if let Some(mut thread) = self.stream.lock().take() {
            thread.stop();
        }
    }
}

/// Plays a [`PlaybackScheduler`] on the default output device.
pub struct CpalSpeaker {
    _thread: StreamThread,
}

impl CpalSpeaker {
    /// Open the output at the scheduler's rate and render from it until
    /// dropped.
    pub fn start(scheduler: PlaybackScheduler) -> Result<Self> {
        let thread = StreamThread::spawn("docvoice-speaker", move || open_output(scheduler))?;
        Ok(Self { _thread: thread })
    }
}

fn open_output(scheduler: PlaybackScheduler) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| RealtimeError::audio("no output device available"))?;
    let supported =
        device.default_output_config().map_err(|e| RealtimeError::audio(e.to_string()))?;
    let channels = supported.channels() as usize;
    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(scheduler.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };
    let mut mono: Vec<f32> = Vec::new();
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                mono.resize(frames, 0.0);
                scheduler.render(&mut mono);
                for (frame, sample) in data.chunks_mut(channels.max(1)).zip(&mono) {
                    frame.fill(*sample);
                }
            },
            |err| tracing::warn!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| RealtimeError::audio(e.to_string()))?;
    stream.play().map_err(|e| RealtimeError::audio(e.to_string()))?;
    Ok(stream)
}
