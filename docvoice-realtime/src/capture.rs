//! Microphone capture: device abstraction and the framing pipeline.

use crate::codec::{
    AudioChunk, AudioFormat, FrameAccumulator, LinearResampler, SampleSink, float32_to_int16,
};
use crate::config::CaptureConfig;
use crate::error::{RealtimeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Host-side state of an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Running,
    /// Paused by the host; [`CaptureDevice::resume`] restarts it.
    Suspended,
    Closed,
}

/// Raw blocks from an open device, at the device's own rate.
#[derive(Debug)]
pub struct CaptureStream {
    pub sample_rate: u32,
    pub samples: mpsc::Receiver<Vec<f32>>,
}

/// A microphone. One stream is open at a time; opening again replaces it.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request access and start delivering samples. A refused permission is
    /// reported as [`RealtimeError::PermissionDenied`].
    async fn open(&self, config: &CaptureConfig) -> Result<CaptureStream>;

    fn state(&self) -> DeviceState;

    async fn resume(&self) -> Result<()>;

    /// Release the hardware. Idempotent.
    fn stop(&self);
}

/// Owns a running capture task. Dropping it stops capture.
pub struct CaptureHandle {
    device: Arc<dyn CaptureDevice>,
    task: JoinHandle<()>,
    stopped: AtomicBool,
}

impl CaptureHandle {
    /// Halt frame delivery and release the device. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.task.abort();
        self.device.stop();
        tracing::debug!("capture stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turns raw device blocks into fixed-size PCM16 frames.
pub struct CapturePipeline;

impl CapturePipeline {
    /// Open `device` and forward `config.block_size`-sample frames at
    /// `config.sample_rate` into `frames`. Every raw block is also copied to
    /// `taps` (recording, volume).
    ///
    /// Frames are dropped rather than queued when `frames` is full; the
    /// pipeline ends when `frames` is closed or the device stops.
    pub async fn start(
        device: Arc<dyn CaptureDevice>,
        config: CaptureConfig,
        frames: mpsc::Sender<AudioChunk>,
        taps: Vec<Arc<dyn SampleSink>>,
    ) -> Result<CaptureHandle> {
        let stream = device.open(&config).await?;
        tracing::info!(
            device_rate = stream.sample_rate,
            frame_rate = config.sample_rate,
            block_size = config.block_size,
            "capture started"
        );
        let task = tokio::spawn(run_pipeline(device.clone(), config, stream, frames, taps));
        Ok(CaptureHandle { device, task, stopped: AtomicBool::new(false) })
    }
}

async fn run_pipeline(
    device: Arc<dyn CaptureDevice>,
    config: CaptureConfig,
    mut stream: CaptureStream,
    frames: mpsc::Sender<AudioChunk>,
    taps: Vec<Arc<dyn SampleSink>>,
) {
    let format = AudioFormat { sample_rate: config.sample_rate, channels: 1, bits_per_sample: 16 };
    let mut accumulator = FrameAccumulator::new(config.block_size);
    let mut resampler = LinearResampler::new(stream.sample_rate, config.sample_rate);
    let mut check = tokio::time::interval(config.resume_check_interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            block = stream.samples.recv() => {
                let Some(block) = block else { break };
                for tap in &taps {
                    tap.write(&block, stream.sample_rate);
                }
                let resampled = resampler.process(&block);
                accumulator.push(&float32_to_int16(&resampled));
                while let Some(frame) = accumulator.pop_frame() {
                    match frames.try_send(AudioChunk::from_i16_samples(&frame, format)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => tracing::trace!("frame sink full, dropping frame"),
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
            }
            _ = check.tick() => {
                if device.state() == DeviceState::Suspended {
                    match device.resume().await {
                        Ok(()) => tracing::debug!("resumed suspended capture device"),
                        Err(err) => tracing::warn!(error = %err, "failed to resume capture device"),
                    }
                }
            }
        }
    }
    tracing::debug!("capture stream ended");
}

/// Software input producing silence (or a test tone) in real time.
///
/// Used when no audio hardware is available, and in tests.
pub struct SilentCaptureDevice {
    amplitude: f32,
    deny: bool,
    state: Arc<Mutex<DeviceState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    opens: AtomicUsize,
    resumes: AtomicUsize,
}

impl Default for SilentCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SilentCaptureDevice {
    const BLOCK_PERIOD: Duration = Duration::from_millis(20);
    const TONE_HZ: f32 = 440.0;

    pub fn new() -> Self {
        Self {
            amplitude: 0.0,
            deny: false,
            state: Arc::new(Mutex::new(DeviceState::Closed)),
            task: Mutex::new(None),
            opens: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    /// Emit a sine tone instead of silence.
    pub fn with_tone(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// A device whose permission is always refused.
    pub fn denied() -> Self {
        let mut device = Self::new();
        device.deny = true;
        device
    }

    /// Simulate the host suspending the input context.
    pub fn suspend(&self) {
        let mut state = self.state.lock();
        if *state == DeviceState::Running {
            *state = DeviceState::Suspended;
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for SilentCaptureDevice {
    async fn open(&self, config: &CaptureConfig) -> Result<CaptureStream> {
        if self.deny {
            return Err(RealtimeError::permission_denied("microphone access was refused"));
        }
        self.stop();
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = DeviceState::Running;

        let sample_rate = config.sample_rate;
        let block_len = (sample_rate as u128 * Self::BLOCK_PERIOD.as_millis() / 1000) as usize;
        let amplitude = self.amplitude;
        let state = self.state.clone();
        let (tx, rx) = mpsc::channel(32);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Self::BLOCK_PERIOD);
            let mut phase = 0.0f32;
            let step = std::f32::consts::TAU * Self::TONE_HZ / sample_rate as f32;
            loop {
                ticker.tick().await;
                if *state.lock() != DeviceState::Running {
                    continue;
                }
                let block: Vec<f32> = (0..block_len)
                    .map(|_| {
                        let sample = amplitude * phase.sin();
                        phase = (phase + step) % std::f32::consts::TAU;
                        sample
                    })
                    .collect();
                if tx.send(block).await.is_err() {
                    break;
                }
            }
        });
        *self.task.lock() = Some(task);
        Ok(CaptureStream { sample_rate, samples: rx })
    }

    fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == DeviceState::Suspended {
            *state = DeviceState::Running;
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        *self.state.lock() = DeviceState::Closed;
    }
}

impl Drop for SilentCaptureDevice {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
