// src/engine/outline.rs

//! Outline flattening and non-zero winding coverage sampling.
//!
//! Outlines arrive from `ttf-parser` in font units; the builder scales them to
//! pixels, flattens curves into line segments, and `rasterize` samples the
//! winding number at sub-pixel positions inside the glyph's pixel box.

use ttf_parser::OutlineBuilder;

use super::{GlyphBitmap, PixelMode};

type Point = [f32; 2];

const QUAD_STEPS: u32 = 8;
const CUBIC_DEPTH: u32 = 4;

#[derive(Clone, Copy, Debug)]
struct Line {
    p0: Point,
    p1: Point,
}

impl Line {
    /// Contribution of this edge to the winding number of a rightward ray
    /// cast from `(x, y)`.
    fn winding(&self, x: f32, y: f32) -> i32 {
        let (p0, p1) = (self.p0, self.p1);
        let crosses = (p0[1] <= y && y < p1[1]) || (p1[1] <= y && y < p0[1]);
        if !crosses {
            return 0;
        }
        let t = (y - p0[1]) / (p1[1] - p0[1]);
        let x_int = p0[0] + t * (p1[0] - p0[0]);
        if x < x_int {
            if p0[1] < p1[1] {
                1
            } else {
                -1
            }
        } else {
            0
        }
    }
}

fn lerp(p0: Point, p1: Point, t: f32) -> Point {
    [p0[0] * (1.0 - t) + p1[0] * t, p0[1] * (1.0 - t) + p1[1] * t]
}

/// Collects a scaled, flattened outline. Y grows upward (font convention).
pub(super) struct FlatOutline {
    lines: Vec<Line>,
    scale_x: f32,
    scale_y: f32,
    current: Point,
    start: Point,
}

impl FlatOutline {
    pub(super) fn new(scale_x: f32, scale_y: f32) -> Self {
        Self {
            lines: Vec::with_capacity(64),
            scale_x,
            scale_y,
            current: [0.0, 0.0],
            start: [0.0, 0.0],
        }
    }

    fn scaled(&self, x: f32, y: f32) -> Point {
        [x * self.scale_x, y * self.scale_y]
    }

    fn push_line(&mut self, p1: Point) {
        if p1 != self.current {
            self.lines.push(Line {
                p0: self.current,
                p1,
            });
        }
        self.current = p1;
    }

    fn subdivide_cubic(&mut self, p0: Point, p1: Point, p2: Point, p3: Point, depth: u32) {
        if depth >= CUBIC_DEPTH {
            self.push_line(p3);
            return;
        }
        let p01 = lerp(p0, p1, 0.5);
        let p12 = lerp(p1, p2, 0.5);
        let p23 = lerp(p2, p3, 0.5);
        let p012 = lerp(p01, p12, 0.5);
        let p123 = lerp(p12, p23, 0.5);
        let mid = lerp(p012, p123, 0.5);
        self.subdivide_cubic(p0, p01, p012, mid, depth + 1);
        self.subdivide_cubic(mid, p123, p23, p3, depth + 1);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn winding(&self, x: f32, y: f32) -> i32 {
        self.lines.iter().map(|l| l.winding(x, y)).sum()
    }

    /// Render into a bitmap whose top-left pixel sits at `(left, top)` in
    /// pixel space (y up). Mono takes one sample per pixel centre, gray
    /// averages a 4x4 grid.
    pub(super) fn rasterize(
        &self,
        left: i32,
        top: i32,
        width: u32,
        rows: u32,
        mode: PixelMode,
    ) -> GlyphBitmap {
        let mut bitmap = GlyphBitmap::new(width, rows, mode);
        let grid: &[f32] = match mode {
            PixelMode::Mono => &[0.5],
            PixelMode::Gray => &[0.125, 0.375, 0.625, 0.875],
        };
        let samples = (grid.len() * grid.len()) as u32;

        for row in 0..rows {
            for col in 0..width {
                let mut inside = 0u32;
                for sy in grid {
                    let y = top as f32 - row as f32 - sy;
                    for sx in grid {
                        let x = left as f32 + col as f32 + sx;
                        if self.winding(x, y) != 0 {
                            inside += 1;
                        }
                    }
                }
                if inside > 0 {
                    let coverage = (inside * 255 + samples / 2) / samples;
                    bitmap.set(col, row, coverage as u8);
                }
            }
        }
        bitmap
    }
}

impl OutlineBuilder for FlatOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.current = self.scaled(x, y);
        self.start = self.current;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p1 = self.scaled(x, y);
        self.push_line(p1);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.current;
        let c = self.scaled(x1, y1);
        let p2 = self.scaled(x, y);
        for step in 1..=QUAD_STEPS {
            let t = step as f32 / QUAD_STEPS as f32;
            let point = lerp(lerp(p0, c, t), lerp(c, p2, t), t);
            self.push_line(point);
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.current;
        let p1 = self.scaled(x1, y1);
        let p2 = self.scaled(x2, y2);
        let p3 = self.scaled(x, y);
        self.subdivide_cubic(p0, p1, p2, p3, 0);
    }

    fn close(&mut self) {
        let start = self.start;
        self.push_line(start);
    }
}
