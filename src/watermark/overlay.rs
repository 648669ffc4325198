use anyhow::{Context, Result};
use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::{DynamicImage, RgbaImage};
use std::path::Path;

use super::error::WatermarkError;
use super::text::MIN_BOX_EDGE;

/// Width in pixels an image watermark is resized to for a base image.
pub fn target_overlay_width(base_width: u32, scale: f64) -> u32 {
    (base_width as f64 * scale).round().max(MIN_BOX_EDGE) as u32
}

/// Decode a watermark image and make sure it carries an alpha channel.
///
/// Images without alpha come back fully opaque.
pub fn load_watermark_image(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open watermark image: {}", path.display()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(anyhow::anyhow!(
            "Watermark image has zero size: {}",
            path.display()
        ));
    }

    Ok(match img {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other => other.to_rgba8(),
    })
}

/// Resize a watermark to `target_width`, keeping its aspect ratio.
pub fn resize_watermark(watermark: &RgbaImage, target_width: u32) -> Result<RgbaImage, WatermarkError> {
    let (src_width, src_height) = watermark.dimensions();
    if src_width == 0 || src_height == 0 || target_width == 0 {
        return Err(WatermarkError::Overlay(format!(
            "cannot resize {}x{} watermark to width {}",
            src_width, src_height, target_width
        )));
    }

    let ratio = target_width as f64 / src_width as f64;
    let target_height = ((src_height as f64 * ratio).round() as u32).max(1);

    if (src_width, src_height) == (target_width, target_height) {
        return Ok(watermark.clone());
    }

    resize_rgba(watermark, target_width, target_height)
}

/// High quality RGBA resize; alpha is premultiplied during filtering so
/// transparent edges do not bleed dark fringes.
fn resize_rgba(img: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, WatermarkError> {
    let resize_err = |e: &dyn std::fmt::Display| WatermarkError::Overlay(format!("resize failed: {}", e));

    let src_image = Image::from_vec_u8(
        img.width(),
        img.height(),
        img.as_raw().clone(),
        PixelType::U8x4,
    )
    .map_err(|e| resize_err(&e))?;

    let mut dst_image = Image::new(width, height, PixelType::U8x4);

    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, Some(&ResizeOptions::default()))
        .map_err(|e| resize_err(&e))?;

    RgbaImage::from_raw(width, height, dst_image.buffer().to_vec())
        .ok_or_else(|| WatermarkError::Overlay("resized buffer has unexpected size".to_string()))
}
