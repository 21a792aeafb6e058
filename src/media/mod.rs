use anyhow::Result;

use crate::sequence::FrameId;

/// RGBA8 pixels of one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub frame: FrameId,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(frame: FrameId, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            frame,
            width,
            height,
            data,
        }
    }

    /// Single-colour buffer, used for placeholders and tests.
    /// True when `data` holds exactly `width * height` RGBA pixels.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * 4
    }

    pub fn filled(frame: FrameId, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(frame, width, height, data)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Turns a frame handle into pixels at the requested display size.
///
/// Implementations must not retain past results; every call is an
/// independent decode.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &FrameId, target_width: u32, target_height: u32)
    -> Result<PixelBuffer>;
}

pub mod image;

pub use image::ImageDecoder;
