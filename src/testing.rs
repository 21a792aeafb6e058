//! Fakes shared by the unit tests.

use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::media::{FrameDecoder, PixelBuffer};
use crate::player::PlaybackCallback;
use crate::sequence::{FrameId, FrameSequence};
use crate::surface::{Canvas, Rect, Surface};

pub fn ids(names: &[&str]) -> Vec<FrameId> {
    names.iter().map(|n| FrameId::from(*n)).collect()
}

pub fn frames(names: &[&str]) -> FrameSequence {
    FrameSequence::new(ids(names))
}

pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[derive(Default)]
pub struct FakeDecoder {
    failing: HashSet<String>,
    sizes: Mutex<Vec<(u32, u32)>>,
}

impl FakeDecoder {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().unwrap().clone()
    }
}

impl FrameDecoder for FakeDecoder {
    fn decode(&self, frame: &FrameId, target_width: u32, target_height: u32) -> Result<PixelBuffer> {
        self.sizes.lock().unwrap().push((target_width, target_height));
        if self.failing.contains(frame.as_str()) {
            return Err(anyhow!("cannot decode {}", frame));
        }
        Ok(PixelBuffer::filled(frame.clone(), 1, 1, [255, 255, 255, 255]))
    }
}

/// Records composited frames and checks acquire/release pairing.
pub struct RecordingSurface {
    size: Mutex<(u32, u32)>,
    available: AtomicBool,
    outstanding: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
    drawn: Mutex<Vec<FrameId>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            available: AtomicBool::new(true),
            outstanding: AtomicBool::new(false),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            drawn: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
    }

    pub fn drawn(&self) -> Vec<FrameId> {
        self.drawn.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn release(&self) {
        assert!(self.outstanding.swap(false, Ordering::SeqCst), "released without acquire");
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    fn acquire(&self) -> Option<Canvas> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        assert!(!self.outstanding.swap(true, Ordering::SeqCst), "acquired twice");
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let (w, h) = self.size();
        Some(Canvas::new(w, h))
    }

    fn composite(&self, _canvas: &mut Canvas, frame: &PixelBuffer, _src: Rect, _dst: Rect) -> Result<()> {
        self.drawn.lock().unwrap().push(frame.frame.clone());
        Ok(())
    }

    fn present(&self, _canvas: Canvas) {
        self.release();
    }

    fn discard(&self, _canvas: Canvas) {
        self.release();
    }
}

#[derive(Default)]
pub struct CountingCallback {
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl CountingCallback {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl PlaybackCallback for CountingCallback {
    fn on_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}
