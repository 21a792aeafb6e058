use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::DEFAULT_INTERVAL_MS;
use crate::media::FrameDecoder;
use crate::sequence::FrameSequence;
use crate::surface::{Rect, Surface};

/// Lifecycle notifications, emitted from the draw thread.
pub trait PlaybackCallback: Send + Sync {
    fn on_started(&self) {}
    fn on_stopped(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub enabled: bool,
    pub paused: bool,
    pub current_index: usize,
    pub interval_ms: u64,
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Drawn,
    Paused,
    Empty,
    Unavailable,
    DecodeFailed,
    DrawFailed,
}

/// State shared between the control thread and the draw thread.
///
/// Each flag is meaningful on its own, so the worker may observe a stale
/// value for at most one iteration.
struct Shared {
    enabled: AtomicBool,
    paused: AtomicBool,
    index: AtomicUsize,
    interval_ms: AtomicU64,
    sequence: Mutex<Arc<FrameSequence>>,
    callback: Mutex<Option<Arc<dyn PlaybackCallback>>>,
}

impl Shared {
    fn sequence(&self) -> Arc<FrameSequence> {
        let guard = self.sequence.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    fn callback(&self) -> Option<Arc<dyn PlaybackCallback>> {
        self.callback.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Acquire))
    }
}

struct Worker {
    handle: JoinHandle<()>,
    // Dropping the sender wakes the worker out of its sleep.
    _cancel: Sender<()>,
}

/// Plays a [`FrameSequence`] onto a [`Surface`] from one background thread.
pub struct PlaybackLoop {
    shared: Arc<Shared>,
    decoder: Arc<dyn FrameDecoder>,
    surface: Arc<dyn Surface>,
    worker: Option<Worker>,
    // Signalled by `stop` but possibly still inside its last iteration.
    retired: Option<JoinHandle<()>>,
}

impl PlaybackLoop {
    pub fn new(decoder: Arc<dyn FrameDecoder>, surface: Arc<dyn Surface>) -> Self {
        Self {
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                index: AtomicUsize::new(0),
                interval_ms: AtomicU64::new(DEFAULT_INTERVAL_MS),
                sequence: Mutex::new(Arc::new(FrameSequence::empty())),
                callback: Mutex::new(None),
            }),
            decoder,
            surface,
            worker: None,
            retired: None,
        }
    }

    pub fn set_callback(&self, callback: Option<Arc<dyn PlaybackCallback>>) {
        *self.shared.callback.lock().unwrap_or_else(|p| p.into_inner()) = callback;
    }

    /// Replaces the frames; picked up at the next index advance.
    pub fn configure_sequence(&self, sequence: FrameSequence) {
        tracing::debug!(event = "sequence_configure", frames = sequence.len(), "Sequence replaced");
        *self.shared.sequence.lock().unwrap_or_else(|p| p.into_inner()) = Arc::new(sequence);
    }

    pub fn set_interval(&self, interval_ms: u64) {
        self.shared.interval_ms.store(interval_ms, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn snapshot(&self) -> PlaybackState {
        let frames = self.shared.sequence().len();
        let index = self.shared.index.load(Ordering::Acquire);
        PlaybackState {
            enabled: self.shared.enabled.load(Ordering::Acquire),
            paused: self.shared.paused.load(Ordering::Acquire),
            current_index: if frames == 0 { index } else { index % frames },
            interval_ms: self.shared.interval_ms.load(Ordering::Acquire),
            frames,
        }
    }

    /// Enables playback, spawning the draw thread unless one is running.
    pub fn start(&mut self) -> Result<()> {
        self.shared.enabled.store(true, Ordering::Release);
        self.shared.paused.store(false, Ordering::Release);

        if self.worker.is_some() {
            return Ok(());
        }
        // Never let two draw threads overlap.
        self.join_retired();

        let (cancel, cancelled) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let decoder = Arc::clone(&self.decoder);
        let surface = Arc::clone(&self.surface);

        let handle = thread::Builder::new()
            .name("animsurface-draw".to_string())
            .spawn(move || run(&shared, decoder.as_ref(), surface.as_ref(), &cancelled))
            .context("Failed to spawn draw thread")?;

        tracing::info!(event = "playback_start", "Draw thread spawned");
        self.worker = Some(Worker {
            handle,
            _cancel: cancel,
        });
        Ok(())
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    /// Signals the draw thread to finish without waiting for it.
    ///
    /// A later `start` waits for that thread before spawning a new one.
    pub fn stop(&mut self) {
        if let Some(handle) = self.halt() {
            self.join_retired();
            self.retired = Some(handle);
        }
    }

    /// Signals the draw thread and blocks until it has left its loop.
    pub fn stop_and_join(&mut self) {
        if let Some(handle) = self.halt() {
            join(handle);
        }
        self.join_retired();
    }

    fn join_retired(&mut self) {
        if let Some(handle) = self.retired.take() {
            join(handle);
        }
    }

    fn halt(&mut self) -> Option<JoinHandle<()>> {
        self.shared.enabled.store(false, Ordering::Release);
        self.shared.paused.store(true, Ordering::Release);

        let worker = self.worker.take()?;
        tracing::info!(event = "playback_stop", "Draw thread signalled");
        Some(worker.handle)
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!(event = "playback_join_fail", "Draw thread panicked");
    }
}

impl Drop for PlaybackLoop {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Emits `on_stopped` when the draw thread leaves `run`, unwinding included.
struct StopNotice<'a>(&'a Shared);

impl Drop for StopNotice<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!(event = "playback_panic", "Draw thread panicked mid-frame");
        }
        if let Some(callback) = self.0.callback() {
            callback.on_stopped();
        }
    }
}

fn run(shared: &Shared, decoder: &dyn FrameDecoder, surface: &dyn Surface, cancelled: &Receiver<()>) {
    if let Some(callback) = shared.callback() {
        callback.on_started();
    }
    let _notice = StopNotice(shared);

    while shared.enabled.load(Ordering::Acquire) {
        let started = Instant::now();

        let outcome = draw_frame(shared, decoder, surface);

        let elapsed = started.elapsed();
        let interval = shared.interval();
        tracing::trace!(
            event = "frame_tick",
            ?outcome,
            diff_ms = elapsed.as_millis() as u64,
            "Iteration finished"
        );

        if sleep_or_cancel(cancelled, interval.saturating_sub(elapsed)) {
            break;
        }
    }

    tracing::debug!(event = "playback_loop_exit", "Draw loop finished");
}

/// Returns true once the owning loop has dropped this worker.
fn sleep_or_cancel(cancelled: &Receiver<()>, remaining: Duration) -> bool {
    if remaining.is_zero() {
        return matches!(cancelled.try_recv(), Err(TryRecvError::Disconnected));
    }
    matches!(cancelled.recv_timeout(remaining), Err(RecvTimeoutError::Disconnected))
}

fn draw_frame(shared: &Shared, decoder: &dyn FrameDecoder, surface: &dyn Surface) -> FrameOutcome {
    if shared.paused.load(Ordering::Acquire) {
        return FrameOutcome::Paused;
    }

    let sequence = shared.sequence();
    if sequence.is_empty() {
        return FrameOutcome::Empty;
    }

    let Some(mut canvas) = surface.acquire() else {
        tracing::debug!(event = "surface_unavailable", "No draw target, skipping frame");
        return FrameOutcome::Unavailable;
    };

    let len = sequence.len();
    let advanced = shared
        .index
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some(i % len + 1));
    let counter = advanced.unwrap_or_else(|i| i);
    let Some((index, frame_id)) = sequence.frame_at(counter) else {
        surface.discard(canvas);
        return FrameOutcome::Empty;
    };

    let (width, height) = surface.size();
    let frame = match decoder.decode(frame_id, width, height) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(event = "frame_decode_fail", frame = %frame_id, index, error = %e, "Skipping frame");
            surface.discard(canvas);
            return FrameOutcome::DecodeFailed;
        }
    };

    surface.clear(&mut canvas);
    let src = Rect::from_size(frame.width, frame.height);
    let dst = canvas.bounds();
    if let Err(e) = surface.composite(&mut canvas, &frame, src, dst) {
        tracing::warn!(event = "frame_draw_fail", frame = %frame_id, index, error = %e, "Skipping frame");
        surface.discard(canvas);
        return FrameOutcome::DrawFailed;
    }

    surface.present(canvas);
    FrameOutcome::Drawn
}
