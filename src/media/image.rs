use std::path::Path;

use anyhow::Context as _;
use image::{DynamicImage, ImageBuffer, imageops::FilterType};

use crate::{
    buffer::{ChannelLayout, PixelBuffer},
    foundation::error::{DotMatrixError, DotMatrixResult},
};

/// Decode a compressed image. Images with an alpha channel decode to RGBA8, others to RGB8.
pub fn decode_image(bytes: &[u8]) -> DotMatrixResult<PixelBuffer> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| DotMatrixError::decode(format!("decode image from memory: {e}")))?;
    from_dynamic(dyn_img)
}

pub fn load_image(path: &Path) -> DotMatrixResult<PixelBuffer> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    decode_image(&bytes)
}

/// Write `buffer` to `path`; the format follows the file extension.
pub fn save_image(buffer: &PixelBuffer, path: &Path) -> DotMatrixResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let color = match buffer.layout() {
        ChannelLayout::Rgb8 => image::ExtendedColorType::Rgb8,
        ChannelLayout::Rgba8 => image::ExtendedColorType::Rgba8,
    };
    image::save_buffer(path, buffer.data(), buffer.width(), buffer.height(), color)
        .map_err(|e| DotMatrixError::encode(format!("write image '{}': {e}", path.display())))
}

/// Largest size with the aspect ratio of `width × height` that fits in `max_width × max_height`.
///
/// Width is constrained first, then height. Never upscales; dimensions stay at least 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut w, mut h) = (f64::from(width), f64::from(height));
    if w > f64::from(max_width) {
        h = f64::from(max_width) * h / w;
        w = f64::from(max_width);
    }
    if h > f64::from(max_height) {
        w = f64::from(max_height) * w / h;
        h = f64::from(max_height);
    }
    ((w as u32).max(1), (h as u32).max(1))
}

/// Downscale `buffer` to fit in `max_width × max_height`. Buffers that already fit are returned
/// unchanged.
pub fn downscale(
    buffer: PixelBuffer,
    max_width: u32,
    max_height: u32,
) -> DotMatrixResult<PixelBuffer> {
    let (w, h) = fit_within(buffer.width(), buffer.height(), max_width, max_height);
    if (w, h) == (buffer.width(), buffer.height()) {
        return Ok(buffer);
    }
    tracing::debug!(
        from_width = buffer.width(),
        from_height = buffer.height(),
        to_width = w,
        to_height = h,
        "downscaling image"
    );

    let (src_w, src_h, layout) = (buffer.width(), buffer.height(), buffer.layout());
    let resized = match layout {
        ChannelLayout::Rgb8 => {
            let img = ImageBuffer::<image::Rgb<u8>, _>::from_raw(src_w, src_h, buffer.into_data())
                .ok_or_else(|| DotMatrixError::invalid_buffer("rgb8 buffer size mismatch"))?;
            image::imageops::resize(&img, w, h, FilterType::Triangle).into_raw()
        }
        ChannelLayout::Rgba8 => {
            let img =
                ImageBuffer::<image::Rgba<u8>, _>::from_raw(src_w, src_h, buffer.into_data())
                    .ok_or_else(|| DotMatrixError::invalid_buffer("rgba8 buffer size mismatch"))?;
            image::imageops::resize(&img, w, h, FilterType::Triangle).into_raw()
        }
    };
    PixelBuffer::new(w, h, layout, resized)
}

fn from_dynamic(img: DynamicImage) -> DotMatrixResult<PixelBuffer> {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        PixelBuffer::new(width, height, ChannelLayout::Rgba8, rgba.into_raw())
    } else {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        PixelBuffer::new(width, height, ChannelLayout::Rgb8, rgb.into_raw())
    }
}
