//! Glyph sources for the rasterizer.
//!
//! The built-in face is the Spleen 12x24 bitmap font, which matches the
//! printer's 12 dot character cell exactly and renders identically on every
//! host. A TrueType file can be configured instead.

use std::path::Path;

use rusttype::{Font, Scale};
use spleen_font::{PSF2Font, FONT_12X24};
use tracing::{info, warn};

use crate::errors::RenderError;
use crate::layout::FontClass;

const CELL_WIDTH: u32 = 12;
const CELL_HEIGHT: u32 = 24;
const CELL_ASCENT: u32 = 19;

/// Glyph cell used for a font class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphSize {
    /// 12x24 cell, 22px outline size.
    Regular,
    /// 10x21 cell, 21px outline size.
    Narrow,
}

impl GlyphSize {
    pub fn for_class(class: FontClass) -> Self {
        if class.is_narrow() {
            GlyphSize::Narrow
        } else {
            GlyphSize::Regular
        }
    }

    pub fn cell(self) -> (u32, u32) {
        match self {
            GlyphSize::Regular => (CELL_WIDTH, CELL_HEIGHT),
            GlyphSize::Narrow => (10, 21),
        }
    }

    pub fn ascent(self) -> u32 {
        match self {
            GlyphSize::Regular => CELL_ASCENT,
            GlyphSize::Narrow => 17,
        }
    }

    /// Pixel size used when drawing with an outline font.
    pub fn outline_px(self) -> f32 {
        match self {
            GlyphSize::Regular => 22.0,
            GlyphSize::Narrow => 21.0,
        }
    }
}

/// A 1-bit glyph bitmap with its baseline position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    pub ascent: u32,
    bits: Vec<bool>,
}

impl GlyphMask {
    fn blank(width: u32, height: u32, ascent: u32) -> Self {
        GlyphMask {
            width,
            height,
            ascent,
            bits: vec![false; (width * height) as usize],
        }
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    pub fn ink_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            self.bits[(y * self.width + x) as usize] = true;
        }
    }

    /// Nearest-neighbour resample.
    fn resized(&self, width: u32, height: u32, ascent: u32) -> Self {
        let mut out = GlyphMask::blank(width, height, ascent);
        for dy in 0..height {
            for dx in 0..width {
                if self.is_set(dx * self.width / width, dy * self.height / height) {
                    out.set(dx, dy);
                }
            }
        }
        out
    }

    /// Outline of the cell, drawn for characters the font does not cover.
    fn placeholder(width: u32, height: u32, ascent: u32) -> Self {
        let mut out = GlyphMask::blank(width, height, ascent);
        for x in 0..width {
            out.set(x, 0);
            out.set(x, height - 1);
        }
        for y in 0..height {
            out.set(0, y);
            out.set(width - 1, y);
        }
        out
    }
}

pub enum Typeface {
    Bitmap,
    Outline(Font<'static>),
}

impl Default for Typeface {
    fn default() -> Self {
        Typeface::Bitmap
    }
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Bitmap => f.write_str("Typeface::Bitmap"),
            Typeface::Outline(_) => f.write_str("Typeface::Outline"),
        }
    }
}

impl Typeface {
    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| {
            RenderError::FontError(format!("Cannot read font {}: {}", path.display(), e))
        })?;
        let font = Font::try_from_vec(data).ok_or_else(|| {
            RenderError::FontError(format!("Failed to parse font {}", path.display()))
        })?;
        info!("Loaded outline font from {}", path.display());
        Ok(Typeface::Outline(font))
    }

    /// Loads the configured font, falling back to the bitmap face when it
    /// cannot be used.
    pub fn from_optional_file(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::from_file(path) {
                Ok(face) => face,
                Err(e) => {
                    warn!("{}. Using the built-in bitmap font.", e);
                    Typeface::Bitmap
                }
            },
            None => Typeface::Bitmap,
        }
    }

    pub fn outline_scale(size: GlyphSize, y_scale: u32) -> Scale {
        let px = size.outline_px();
        Scale {
            x: px,
            y: px * y_scale as f32,
        }
    }
}

/// Looks up `ch` in the Spleen 12x24 font and resamples it to `size`.
pub fn bitmap_glyph(ch: char, size: GlyphSize) -> Result<GlyphMask, RenderError> {
    let mut spleen = PSF2Font::new(FONT_12X24)
        .map_err(|_| RenderError::FontError("Built-in bitmap font is corrupt".to_string()))?;

    let mut mask = GlyphMask::blank(CELL_WIDTH, CELL_HEIGHT, CELL_ASCENT);
    let utf8 = ch.to_string();
    match spleen.glyph_for_utf8(utf8.as_bytes()) {
        Some(glyph) => {
            for (row_y, row) in glyph.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if on {
                        mask.set(col_x as u32, row_y as u32);
                    }
                }
            }
        }
        None => mask = GlyphMask::placeholder(CELL_WIDTH, CELL_HEIGHT, CELL_ASCENT),
    }

    let (width, height) = size.cell();
    if (width, height) == (CELL_WIDTH, CELL_HEIGHT) {
        Ok(mask)
    } else {
        Ok(mask.resized(width, height, size.ascent()))
    }
}
