//! Executes draw instructions onto a fixed-width pixel surface.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::debug;

use crate::errors::RenderError;
use crate::layout::{DrawInstruction, Layout, SURFACE_WIDTH};
use crate::typeface::{bitmap_glyph, GlyphMask, GlyphSize, Typeface};

pub const BACKGROUND: Rgb<u8> = Rgb([0xe0, 0xe0, 0xe0]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// The bitmap a report is drawn onto. Always [`SURFACE_WIDTH`] dots wide.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbImage,
}

impl RasterSurface {
    pub fn new(height: u32) -> Result<Self, RenderError> {
        if height == 0 {
            return Err(RenderError::InvalidDimensions(format!(
                "surface height must be positive (width {})",
                SURFACE_WIDTH
            )));
        }
        Ok(RasterSurface {
            image: RgbImage::from_pixel(SURFACE_WIDTH, height, BACKGROUND),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    fn put(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, INK);
        }
    }
}

/// Drawing state for one render call: the surface, the face, and the
/// current vertical scale.
pub struct DrawContext<'f> {
    surface: RasterSurface,
    typeface: &'f Typeface,
    y_scale: u32,
    glyphs: HashMap<(char, GlyphSize), GlyphMask>,
}

impl<'f> DrawContext<'f> {
    pub fn new(surface: RasterSurface, typeface: &'f Typeface) -> Self {
        DrawContext {
            surface,
            typeface,
            y_scale: 1,
            glyphs: HashMap::new(),
        }
    }

    pub fn y_scale(&self) -> u32 {
        self.y_scale
    }

    /// Multiplies the vertical axis by `factor` until the guard is dropped.
    pub fn scale_y(&mut self, factor: u32) -> ScaledY<'_, 'f> {
        let factor = factor.max(1);
        self.y_scale *= factor;
        ScaledY { ctx: self, factor }
    }

    pub fn draw(&mut self, instruction: &DrawInstruction) -> Result<(), RenderError> {
        if instruction.y_scale > 1 {
            let mut scaled = self.scale_y(instruction.y_scale);
            scaled.draw_glyphs(instruction)
        } else {
            self.draw_glyphs(instruction)
        }
    }

    /// Draws with the current transform. Fails when the line starts below
    /// the surface.
    pub fn draw_glyphs(&mut self, instruction: &DrawInstruction) -> Result<(), RenderError> {
        let size = GlyphSize::for_class(instruction.class);
        let scale = self.y_scale as i32;
        let baseline = instruction.baseline_y * scale;
        let top = (instruction.baseline_y - size.ascent() as i32) * scale;

        if top >= self.surface.height() as i32 {
            return Err(RenderError::InvalidDimensions(format!(
                "line {} starts at y={} but the surface is {} dots tall",
                instruction.line,
                top,
                self.surface.height()
            )));
        }

        let bold = instruction.class.is_bold();
        let typeface = self.typeface;
        for (x, ch) in instruction.glyphs() {
            if ch.is_whitespace() {
                continue;
            }
            match typeface {
                Typeface::Bitmap => {
                    let glyph = self.glyph(ch, size)?;
                    blit(&mut self.surface, &glyph, x, top, scale);
                    if bold {
                        blit(&mut self.surface, &glyph, x + 1, top, scale);
                    }
                }
                Typeface::Outline(font) => {
                    let font_scale = Typeface::outline_scale(size, self.y_scale);
                    let ascent = font.v_metrics(font_scale).ascent.round() as i32;
                    let text = ch.to_string();
                    let passes = if bold { 2 } else { 1 };
                    for dx in 0..passes {
                        draw_text_mut(
                            &mut self.surface.image,
                            INK,
                            x + dx,
                            baseline - ascent,
                            font_scale,
                            font,
                            &text,
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn glyph(&mut self, ch: char, size: GlyphSize) -> Result<GlyphMask, RenderError> {
        if let Some(glyph) = self.glyphs.get(&(ch, size)) {
            return Ok(glyph.clone());
        }
        let glyph = bitmap_glyph(ch, size)?;
        self.glyphs.insert((ch, size), glyph.clone());
        Ok(glyph)
    }

    pub fn finish(self) -> RasterSurface {
        self.surface
    }
}

/// Restores the vertical scale on drop, including when drawing fails.
pub struct ScaledY<'c, 'f> {
    ctx: &'c mut DrawContext<'f>,
    factor: u32,
}

impl<'c, 'f> Deref for ScaledY<'c, 'f> {
    type Target = DrawContext<'f>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<'c, 'f> DerefMut for ScaledY<'c, 'f> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ScaledY<'_, '_> {
    fn drop(&mut self) {
        self.ctx.y_scale /= self.factor;
    }
}

fn blit(surface: &mut RasterSurface, glyph: &GlyphMask, x: i32, top: i32, scale: i32) {
    for gy in 0..glyph.height {
        for gx in 0..glyph.width {
            if !glyph.is_set(gx, gy) {
                continue;
            }
            for s in 0..scale {
                surface.put(x + gx as i32, top + gy as i32 * scale + s);
            }
        }
    }
}

/// Allocates a surface sized for `layout` and draws every line in order.
pub fn rasterize(layout: &Layout, typeface: &Typeface) -> Result<RasterSurface, RenderError> {
    let surface = RasterSurface::new(layout.surface_height())?;
    let mut ctx = DrawContext::new(surface, typeface);

    for instruction in layout.instructions() {
        ctx.draw(&instruction)?;
    }

    let surface = ctx.finish();
    debug!(
        "Rasterized {} lines onto {}x{} surface",
        layout.cursor(),
        surface.width(),
        surface.height()
    );
    Ok(surface)
}
