//! ESC/POS command batch for the receipt printer.
//!
//! Builds the exact byte sequence sent for one job: initialization, print
//! density, centered raster images and a full cut.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use crate::layout::SURFACE_WIDTH;

/// ESC t 40: select character code table 40.
pub const INIT: [u8; 3] = [0x1B, 0x74, 0x28];
/// GS ( K: print density / mode.
pub const DENSITY_MODE: [u8; 7] = [0x1D, 0x28, 0x4B, 0x02, 0x00, 0x32, 0x06];
/// ESC a 1
pub const ALIGN_CENTER: [u8; 3] = [0x1B, 0x61, 0x01];
pub const LINE_FEED: u8 = 0x0A;
/// GS V 0
pub const FULL_CUT: [u8; 3] = [0x1D, 0x56, 0x00];
/// GS v 0 with normal density (m = 0).
pub const RASTER_HEADER: [u8; 4] = [0x1D, 0x76, 0x30, 0x00];

const MAX_BAND_ROWS: u32 = 0xFFFF;
const ALPHA_THRESHOLD: u8 = 126;
const LUMA_THRESHOLD: f32 = 128.0;

/// Byte buffer for one print job.
#[derive(Debug, Default, Clone)]
pub struct CommandBatch {
    buf: Vec<u8>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64 * 1024),
        }
    }

    pub fn init(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&INIT);
        self
    }

    pub fn density(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&DENSITY_MODE);
        self
    }

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&ALIGN_CENTER);
        self
    }

    pub fn image(&mut self, img: &DynamicImage) -> &mut Self {
        self.buf.extend_from_slice(&raster_image(img));
        self
    }

    pub fn line_feed(&mut self) -> &mut Self {
        self.buf.push(LINE_FEED);
        self
    }

    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&FULL_CUT);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Converts an image to a `GS v 0` raster command.
///
/// Images wider than the print head are scaled down to it, keeping the
/// aspect ratio. The first dot of each row is the most significant bit.
pub fn raster_image(img: &DynamicImage) -> Vec<u8> {
    let (w, h) = img.dimensions();

    let resized;
    let img = if w > SURFACE_WIDTH {
        let new_h = ((h as f64 * SURFACE_WIDTH as f64 / w as f64).round() as u32).max(1);
        debug!(from = ?(w, h), to = ?(SURFACE_WIDTH, new_h), "resizing raster image");
        resized = img.resize_exact(SURFACE_WIDTH, new_h, FilterType::Nearest);
        &resized
    } else {
        img
    };

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let x_bytes = width.div_ceil(8);

    let bands = height.div_ceil(MAX_BAND_ROWS).max(1);
    let mut data = Vec::with_capacity((8 * bands + x_bytes * height) as usize);

    // yL/yH cap one command at 65535 rows, so taller images go out as
    // consecutive bands.
    let mut top = 0;
    while top < height {
        let rows = (height - top).min(MAX_BAND_ROWS);
        data.extend_from_slice(&RASTER_HEADER);
        data.push(x_bytes as u8);
        data.push((x_bytes >> 8) as u8);
        data.push(rows as u8);
        data.push((rows >> 8) as u8);

        for y in top..top + rows {
            for x_byte in 0..x_bytes {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let x = x_byte * 8 + bit;
                    if x < width && is_black(rgba.get_pixel(x, y).0) {
                        byte |= 1 << (7 - bit);
                    }
                }
                data.push(byte);
            }
        }
        top += rows;
    }

    data
}

fn is_black([r, g, b, a]: [u8; 4]) -> bool {
    if a <= ALPHA_THRESHOLD {
        return false;
    }
    let luma = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    luma < LUMA_THRESHOLD
}

/// Opens the receipt logo. A missing or unreadable logo is skipped.
pub fn load_logo(path: &Path) -> Option<DynamicImage> {
    if !path.exists() {
        debug!(path = %path.display(), "no logo configured at path");
        return None;
    }
    match image::open(path) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "open logo failed");
            None
        }
    }
}
