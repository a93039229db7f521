//! In-memory PNG encoding of a finished surface.
//!
//! The surface is first written losslessly as RGB, then decoded and written
//! again as 8-bit grayscale, which is what the thermal raster conversion
//! consumes. Both passes use fixed encoder settings, so identical surfaces
//! always produce identical bytes.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, GrayImage, ImageEncoder, ImageFormat, RgbImage};

use crate::errors::RenderError;
use crate::raster::RasterSurface;

pub fn encode_png(surface: RasterSurface) -> Result<Vec<u8>, RenderError> {
    let image = surface.image();
    if image.width() == 0 || image.height() == 0 {
        return Err(RenderError::InvalidDimensions(format!(
            "cannot encode a {}x{} surface",
            image.width(),
            image.height()
        )));
    }

    let lossless = encode_rgb(image)?;
    normalize_for_device(&lossless)
}

fn encode_rgb(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(|e| RenderError::ImageEncode(e.to_string()))?;
    Ok(buf)
}

/// Re-encodes any PNG as 8-bit grayscale.
pub fn normalize_for_device(png: &[u8]) -> Result<Vec<u8>, RenderError> {
    let decoded = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|e| RenderError::ImageEncode(format!("Failed to decode PNG: {}", e)))?;
    let gray: GrayImage = decoded.to_luma8();

    let mut out = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut out, CompressionType::Default, FilterType::Adaptive)
        .write_image(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)
        .map_err(|e| RenderError::ImageEncode(e.to_string()))?;
    Ok(out.into_inner())
}
