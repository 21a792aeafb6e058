use anyhow::{Context, Result, bail};
use fast_image_resize as fr;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::media::PixelBuffer;
use crate::media::image::ScaleFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    fn clamp_to(&self, width: u32, height: u32) -> Rect {
        Rect::new(
            self.left.min(width),
            self.top.min(height),
            self.right.min(width),
            self.bottom.min(height),
        )
    }
}

/// RGBA8 draw target handed out by [`Surface::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[at..at + 4]);
        Some(px)
    }

    /// Every pixel becomes transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Stretches `src` of `frame` into `dst`, replacing what was there.
    /// Both rectangles are clipped to their images.
    pub fn draw_scaled(
        &mut self,
        frame: &PixelBuffer,
        src: Rect,
        dst: Rect,
        filter: ScaleFilter,
    ) -> Result<()> {
        if !frame.is_consistent() {
            bail!(
                "Frame {} is {}x{} but carries {} bytes",
                frame.frame,
                frame.width,
                frame.height,
                frame.data.len()
            );
        }
        let src = src.clamp_to(frame.width, frame.height);
        let dst = dst.clamp_to(self.width, self.height);
        if src.is_empty() || dst.is_empty() {
            return Ok(());
        }

        let scaled;
        let (pixels, row_width): (&[u8], u32) = if src == Rect::from_size(frame.width, frame.height)
            && (src.width(), src.height()) == (dst.width(), dst.height())
        {
            (frame.data.as_slice(), frame.width)
        } else {
            let src_image =
                fr::images::ImageRef::new(frame.width, frame.height, &frame.data, fr::PixelType::U8x4)?;
            let mut dst_image = fr::images::Image::new(dst.width(), dst.height(), fr::PixelType::U8x4);

            let options = fr::ResizeOptions::new()
                .resize_alg(filter.resize_alg())
                .crop(
                    src.left as f64,
                    src.top as f64,
                    src.width() as f64,
                    src.height() as f64,
                );
            fr::Resizer::new().resize(&src_image, &mut dst_image, &options)?;
            scaled = dst_image.into_vec();
            (scaled.as_slice(), dst.width())
        };

        let row_bytes = dst.width() as usize * 4;
        let stride = self.width as usize * 4;
        for row in 0..dst.height() as usize {
            let from = row * row_width as usize * 4;
            let to = (dst.top as usize + row) * stride + dst.left as usize * 4;
            self.pixels[to..to + row_bytes].copy_from_slice(&pixels[from..from + row_bytes]);
        }
        Ok(())
    }
}

/// Drawing surface the playback worker renders into.
///
/// Every canvas returned by `acquire` must be handed back through exactly
/// one of `present` or `discard`.
pub trait Surface: Send + Sync {
    /// Current size, read on every draw.
    fn size(&self) -> (u32, u32);

    /// `None` when the surface cannot be drawn right now.
    fn acquire(&self) -> Option<Canvas>;

    fn clear(&self, canvas: &mut Canvas) {
        canvas.clear();
    }

    fn composite(&self, canvas: &mut Canvas, frame: &PixelBuffer, src: Rect, dst: Rect) -> Result<()> {
        canvas.draw_scaled(frame, src, dst, ScaleFilter::Bilinear)
    }

    fn present(&self, canvas: Canvas);

    /// Releases a canvas without posting it.
    fn discard(&self, canvas: Canvas) {
        drop(canvas);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub width: u32,
    pub height: u32,
    pub presented: u64,
    pub discarded: u64,
}

struct SoftwareInner {
    stats: SurfaceStats,
    front: Option<Canvas>,
    outstanding: bool,
    dump_dir: Option<PathBuf>,
}

/// In-memory surface keeping the last presented frame.
pub struct SoftwareSurface {
    inner: Mutex<SoftwareInner>,
    filter: ScaleFilter,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(SoftwareInner {
                stats: SurfaceStats {
                    width,
                    height,
                    ..Default::default()
                },
                front: None,
                outstanding: false,
                dump_dir: None,
            }),
            filter: ScaleFilter::Bilinear,
        }
    }

    pub fn with_filter(mut self, filter: ScaleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Writes each presented frame as `frame_NNNNNN.png` into `dir`.
    pub fn with_dump_dir(self, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;
        self.lock().dump_dir = Some(dir);
        Ok(self)
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.lock();
        inner.stats.width = width;
        inner.stats.height = height;
        tracing::debug!(event = "surface_resize", width, height, "Software surface resized");
    }

    pub fn stats(&self) -> SurfaceStats {
        self.lock().stats
    }

    pub fn front_buffer(&self) -> Option<Canvas> {
        self.lock().front.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SoftwareInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dump(dir: &std::path::Path, index: u64, canvas: &Canvas) -> Result<()> {
        let path = dir.join(format!("frame_{:06}.png", index));
        let img = image::RgbaImage::from_raw(canvas.width(), canvas.height(), canvas.pixels().to_vec())
            .context("Canvas size does not match its pixels")?;
        img.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl Surface for SoftwareSurface {
    fn size(&self) -> (u32, u32) {
        let stats = self.lock().stats;
        (stats.width, stats.height)
    }

    fn acquire(&self) -> Option<Canvas> {
        let mut inner = self.lock();
        if inner.outstanding || inner.stats.width == 0 || inner.stats.height == 0 {
            return None;
        }
        inner.outstanding = true;
        Some(Canvas::new(inner.stats.width, inner.stats.height))
    }

    fn composite(&self, canvas: &mut Canvas, frame: &PixelBuffer, src: Rect, dst: Rect) -> Result<()> {
        canvas.draw_scaled(frame, src, dst, self.filter)
    }

    fn present(&self, canvas: Canvas) {
        let dump = {
            let mut inner = self.lock();
            inner.outstanding = false;
            inner.stats.presented += 1;
            inner.dump_dir.clone().map(|dir| (dir, inner.stats.presented))
        };

        // Encoding happens unlocked so status reads never wait on PNG writes.
        if let Some((dir, index)) = dump {
            if let Err(e) = Self::dump(&dir, index, &canvas) {
                tracing::warn!(event = "frame_dump_fail", error = %e, "Failed to dump presented frame");
            }
        }
        self.lock().front = Some(canvas);
    }

    fn discard(&self, canvas: Canvas) {
        let mut inner = self.lock();
        inner.outstanding = false;
        inner.stats.discarded += 1;
        drop(canvas);
    }
}
