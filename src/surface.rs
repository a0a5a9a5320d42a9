// src/surface.rs

//! Drawing surfaces.
//!
//! A `Surface` accepts glyph bitmaps at integer offsets and can be cleared.
//! `Canvas` is an RGBA framebuffer that can be written out as PNG;
//! `RecordingSurface` only remembers what was asked of it.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::GlyphBitmap;

fn opaque_alpha() -> u8 {
    255
}

/// RGBA color in 32-bit format (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque_alpha")]
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert to RGBA byte array
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A 2D raster target.
pub trait Surface {
    /// Draw `bitmap` with its top-left pixel at `(x, y)`. Pixels outside the
    /// surface are clipped.
    fn blit(&mut self, bitmap: &GlyphBitmap, x: i32, y: i32);

    fn clear(&mut self, color: Rgba);

    fn size(&self) -> (u32, u32);
}

// ═══════════════════════════════════════════════════════════════════════════
// Canvas
// ═══════════════════════════════════════════════════════════════════════════

/// Row-major RGBA framebuffer. Glyph coverage is blended in `foreground`.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    foreground: Rgba,
}

impl Canvas {
    /// A white canvas drawing in black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            foreground: Rgba::BLACK,
        };
        canvas.clear(Rgba::WHITE);
        canvas
    }

    pub fn with_foreground(mut self, foreground: Rgba) -> Self {
        self.foreground = foreground;
        self
    }

    pub fn set_foreground(&mut self, foreground: Rgba) {
        self.foreground = foreground;
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[idx..idx + 4];
        Some(Rgba::new(p[0], p[1], p[2], p[3]))
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// PNG-encoded contents.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        let img = self.image_or_error()?;
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        debug!("Canvas: writing {}x{} PNG to {}", self.width, self.height, path.display());
        self.image_or_error()?
            .save_with_format(path, ImageFormat::Png)
    }

    fn image_or_error(&self) -> Result<RgbaImage, image::ImageError> {
        self.to_image().ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })
    }

    fn blend(&mut self, x: u32, y: u32, coverage: u8) {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let fg = self.foreground.to_bytes();
        let c = u32::from(coverage);
        for (channel, &src) in self.pixels[idx..idx + 4].iter_mut().zip(fg.iter()) {
            let dst = u32::from(*channel);
            *channel = ((u32::from(src) * c + dst * (255 - c) + 127) / 255) as u8;
        }
    }
}

impl Surface for Canvas {
    fn blit(&mut self, bitmap: &GlyphBitmap, x: i32, y: i32) {
        for row in 0..bitmap.rows {
            let dest_y = y + row as i32;
            if dest_y < 0 {
                continue;
            }
            if dest_y >= self.height as i32 {
                break;
            }
            for col in 0..bitmap.width {
                let dest_x = x + col as i32;
                if dest_x < 0 {
                    continue;
                }
                if dest_x >= self.width as i32 {
                    break;
                }
                let coverage = bitmap.coverage(col, row);
                if coverage > 0 {
                    self.blend(dest_x as u32, dest_y as u32, coverage);
                }
            }
        }
    }

    fn clear(&mut self, color: Rgba) {
        let color_bytes = color.to_bytes();
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color_bytes);
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RecordingSurface
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Clear(Rgba),
    Blit { x: i32, y: i32, width: u32, rows: u32 },
}

/// Remembers every clear and blit, draws nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Blit positions, in order.
    pub fn blits(&self) -> Vec<(i32, i32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Blit { x, y, .. } => Some((*x, *y)),
                SurfaceOp::Clear(_) => None,
            })
            .collect()
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }
}

impl Surface for RecordingSurface {
    fn blit(&mut self, bitmap: &GlyphBitmap, x: i32, y: i32) {
        self.ops.push(SurfaceOp::Blit {
            x,
            y,
            width: bitmap.width,
            rows: bitmap.rows,
        });
    }

    fn clear(&mut self, color: Rgba) {
        self.ops.push(SurfaceOp::Clear(color));
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
