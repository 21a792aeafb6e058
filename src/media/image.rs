use anyhow::{Result, anyhow};
use fast_image_resize as fr;
use image as img_crate;

use crate::media::{FrameDecoder, PixelBuffer};
use crate::sequence::FrameId;

/// Decodes frames from image files and scales them to the surface size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder {
    filter: ScaleFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleFilter {
    Nearest,
    Bilinear,
    #[default]
    Lanczos,
}

impl ScaleFilter {
    pub(crate) fn resize_alg(self) -> fr::ResizeAlg {
        match self {
            ScaleFilter::Nearest => fr::ResizeAlg::Nearest,
            ScaleFilter::Bilinear => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            ScaleFilter::Lanczos => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: ScaleFilter) -> Self {
        Self { filter }
    }

    fn resize(
        &self,
        data: Vec<u8>,
        (src_width, src_height): (u32, u32),
        (width, height): (u32, u32),
    ) -> Result<Vec<u8>> {
        let src_image = fr::images::Image::from_vec_u8(src_width, src_height, data, fr::PixelType::U8x4)?;
        let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

        let options = fr::ResizeOptions::new().resize_alg(self.filter.resize_alg());
        let mut resizer = fr::Resizer::new();
        resizer.resize(&src_image, &mut dst_image, &options)?;

        Ok(dst_image.into_vec())
    }
}

impl FrameDecoder for ImageDecoder {
    fn decode(&self, frame: &FrameId, target_width: u32, target_height: u32) -> Result<PixelBuffer> {
        let path = frame.as_str();
        let img = img_crate::open(path).map_err(|e| anyhow!("Failed to load image {}: {}", path, e))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        if width == 0 || height == 0 {
            return Err(anyhow!("Image {} has no pixels", path));
        }

        tracing::trace!(event = "frame_decoded", path = %path, width, height, "Frame decoded");

        if target_width == 0 || target_height == 0 || (width, height) == (target_width, target_height) {
            return Ok(PixelBuffer::new(frame.clone(), width, height, rgba.into_raw()));
        }

        let data = self.resize(rgba.into_raw(), (width, height), (target_width, target_height))?;
        Ok(PixelBuffer::new(frame.clone(), target_width, target_height, data))
    }
}
