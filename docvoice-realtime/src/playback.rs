//! Gapless playback scheduling on an output clock.
//!
//! The scheduler never touches hardware. An output device (or
//! [`spawn_realtime_renderer`] when there is none) pulls mixed samples with
//! [`PlaybackScheduler::render`], and the clock is the count of frames
//! rendered so far. Buffers are laid end to end on that clock, so scheduling
//! never drifts against wall time.

use crate::codec::{AudioBuffer, SampleSink, rms};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Where a buffer landed on the output clock, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSpan {
    pub start: u64,
    pub end: u64,
}

impl ScheduledSpan {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

struct Queued {
    samples: AudioBuffer,
    span: ScheduledSpan,
}

struct Inner {
    sample_rate: u32,
    clock: u64,
    next_start: u64,
    generation: u64,
    queue: VecDeque<Queued>,
    taps: Vec<Arc<dyn SampleSink>>,
}

impl Inner {
    fn drop_finished(&mut self) {
        while self.queue.front().is_some_and(|q| q.span.end <= self.clock) {
            self.queue.pop_front();
        }
    }
}

/// FIFO of decoded buffers played back to back.
///
/// Cloning yields another handle to the same schedule. One producer enqueues;
/// [`interrupt_all`](Self::interrupt_all) may be called from anywhere and
/// always wins over buffers that have not finished.
#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<Mutex<Inner>>,
    idle: Arc<watch::Sender<bool>>,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sample_rate,
                clock: 0,
                next_start: 0,
                generation: 0,
                queue: VecDeque::new(),
                taps: Vec::new(),
            })),
            idle: Arc::new(idle),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    /// Frames rendered so far.
    pub fn clock(&self) -> u64 {
        self.inner.lock().clock
    }

    /// Current interruption generation. Producers capture it when a reply
    /// starts and pass it to [`enqueue_for`](Self::enqueue_for).
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Schedule `buffer` right after everything already queued, or now if
    /// the queue has drained. Empty buffers are not scheduled.
    pub fn enqueue(&self, buffer: AudioBuffer) -> Option<ScheduledSpan> {
        let mut inner = self.inner.lock();
        let generation = inner.generation;
        self.schedule(&mut inner, generation, buffer)
    }

    /// Like [`enqueue`](Self::enqueue), but dropped when an interruption
    /// happened after `generation` was read.
    pub fn enqueue_for(&self, generation: u64, buffer: AudioBuffer) -> Option<ScheduledSpan> {
        let mut inner = self.inner.lock();
        self.schedule(&mut inner, generation, buffer)
    }

    fn schedule(&self, inner: &mut Inner, generation: u64, buffer: AudioBuffer) -> Option<ScheduledSpan> {
        if generation != inner.generation {
            tracing::debug!(generation, current = inner.generation, "dropping buffer from interrupted turn");
            return None;
        }
        let samples = buffer.resampled(inner.sample_rate);
        if samples.is_empty() {
            return None;
        }
        let start = inner.next_start.max(inner.clock);
        let span = ScheduledSpan { start, end: start + samples.len() as u64 };
        inner.next_start = span.end;
        inner.queue.push_back(Queued { samples, span });
        self.idle.send_replace(false);
        Some(span)
    }

    /// Stop the sounding buffer, discard everything pending and restart the
    /// schedule at the current clock.
    pub fn interrupt_all(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.queue.len();
        inner.queue.clear();
        inner.next_start = inner.clock;
        inner.generation += 1;
        drop(inner);
        self.idle.send_replace(true);
        if dropped > 0 {
            tracing::debug!(dropped, "playback interrupted");
        }
    }

    /// Fill `out` with the next `out.len()` frames and advance the clock.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut inner = self.inner.lock();
        let from = inner.clock;
        let to = from + out.len() as u64;

        for queued in inner.queue.iter() {
            if queued.span.start >= to {
                break;
            }
            if queued.span.end <= from {
                continue;
            }
            let begin = queued.span.start.max(from);
            let end = queued.span.end.min(to);
            let src = &queued.samples.samples()
                [(begin - queued.span.start) as usize..(end - queued.span.start) as usize];
            out[(begin - from) as usize..(end - from) as usize].copy_from_slice(src);
        }

        inner.clock = to;
        inner.drop_finished();
        let idle = inner.queue.is_empty();
        let rate = inner.sample_rate;
        let taps = inner.taps.clone();
        drop(inner);

        for tap in &taps {
            tap.write(out, rate);
        }
        if idle && !*self.idle.borrow() {
            self.idle.send_replace(true);
        }
    }

    /// Buffers queued or sounding.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Watch that flips to `true` whenever the queue drains.
    pub fn subscribe_idle(&self) -> watch::Receiver<bool> {
        self.idle.subscribe()
    }

    /// Resolve once nothing is queued or sounding.
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe_idle();
        let _ = rx.wait_for(|idle| *idle).await;
    }

    /// Copy every rendered block (silence included) to `tap`.
    pub fn add_tap(&self, tap: Arc<dyn SampleSink>) {
        self.inner.lock().taps.push(tap);
    }

    /// Interrupt and detach all taps. Used when a call ends.
    pub fn reset(&self) {
        self.interrupt_all();
        self.inner.lock().taps.clear();
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PlaybackScheduler")
            .field("sample_rate", &inner.sample_rate)
            .field("clock", &inner.clock)
            .field("queued", &inner.queue.len())
            .field("generation", &inner.generation)
            .finish()
    }
}

/// Aborts the renderer task when dropped.
#[derive(Debug)]
pub struct RendererHandle(JoinHandle<()>);

impl Drop for RendererHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Render into a null output in real time, so the clock advances without
/// an audio device.
pub fn spawn_realtime_renderer(scheduler: PlaybackScheduler, period: Duration) -> RendererHandle {
    let frames =
        ((scheduler.sample_rate() as u128 * period.as_micros()) / 1_000_000).max(1) as usize;
    RendererHandle(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        let mut block = vec![0.0f32; frames];
        loop {
            ticker.tick().await;
            scheduler.render(&mut block);
        }
    }))
}

/// Publishes the RMS level of the samples it sees, scaled into [0, 1].
pub struct VolumeMeter {
    level: Arc<watch::Sender<f32>>,
    gain: f32,
}

impl VolumeMeter {
    pub fn new(level: Arc<watch::Sender<f32>>, gain: f32) -> Self {
        Self { level, gain }
    }

    pub fn level_of(samples: &[f32], gain: f32) -> f32 {
        (rms(samples) * gain).clamp(0.0, 1.0)
    }
}

impl SampleSink for VolumeMeter {
    fn write(&self, samples: &[f32], _sample_rate: u32) {
        self.level.send_replace(Self::level_of(samples, self.gain));
    }
}
