// src/renderer.rs

//! Text rendering: populate, lay out, blit.
//!
//! Glyph population and layout (including every kerning lookup) run inside one
//! engine session, so the face and size can't change underneath a run. Blits
//! happen after the session is released; they only touch the shared bitmaps.

use std::sync::Arc;

use log::{debug, trace};

use crate::engine::{GlyphEntry, RasterEngine};
use crate::error::RenderError;
use crate::layout::{layout_run, LayoutOptions, PenPosition, Run};
use crate::loader::FontLoader;
use crate::surface::Surface;

/// What to draw and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest<'a> {
    pub family: &'a str,
    /// `None` means the family's default style.
    pub style: Option<&'a str>,
    pub text: &'a str,
    /// Pen start; `y` is the baseline.
    pub origin: PenPosition,
    /// Zero copies the height.
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Draws single-line runs through a shared `FontLoader`.
pub struct TextRenderer<E: RasterEngine> {
    loader: Arc<FontLoader<E>>,
    layout: LayoutOptions,
}

impl<E: RasterEngine> TextRenderer<E> {
    pub fn new(loader: Arc<FontLoader<E>>) -> Self {
        Self {
            loader,
            layout: LayoutOptions::default(),
        }
    }

    pub fn with_layout_options(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    pub fn loader(&self) -> &Arc<FontLoader<E>> {
        &self.loader
    }

    /// Positions for `request` without drawing anything.
    pub fn layout(&self, request: &RenderRequest<'_>) -> Result<Run, RenderError> {
        self.layout_from(request, |_| request.origin)
    }

    /// Like `layout`, but the pen origin is computed from the populated
    /// glyph slots (one per character) instead of taken from `request`.
    pub fn layout_from(
        &self,
        request: &RenderRequest<'_>,
        origin: impl FnOnce(&[Option<GlyphEntry>]) -> PenPosition,
    ) -> Result<Run, RenderError> {
        let mode = self.loader.options().kerning_mode;
        let options = self.layout;
        let run = self.loader.with_glyphs(
            request.family,
            request.style,
            request.pixel_width,
            request.pixel_height,
            request.text,
            |entries, session| {
                layout_run(
                    entries,
                    |prev, current| session.kerning(prev, current, mode),
                    origin(entries),
                    options,
                )
            },
        )?;
        trace!(
            "TextRenderer: laid out {} glyph(s), {} skipped, pen {:?}",
            run.glyphs.len(),
            run.skipped,
            run.pen
        );
        Ok(run)
    }

    /// Lay out `request` and blit it onto `surface`. Returns the final pen.
    ///
    /// Without a surface nothing is loaded or drawn.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: Option<&mut S>,
        request: &RenderRequest<'_>,
    ) -> Result<PenPosition, RenderError> {
        let surface = surface.ok_or(RenderError::NoDrawingSurface)?;
        let run = self.layout(request)?;
        draw_run(surface, &run);
        Ok(run.pen)
    }
}

/// Blit every inked glyph of `run`.
pub fn draw_run<S: Surface + ?Sized>(surface: &mut S, run: &Run) {
    let mut blits = 0;
    for glyph in &run.glyphs {
        if let Some(blit) = &glyph.blit {
            surface.blit(&blit.bitmap, blit.x, blit.y);
            blits += 1;
        }
    }
    debug!("TextRenderer: {} blit(s)", blits);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FontCatalog;
    use crate::engine::{HeadlessEngine, KerningMode, Vector26Dot6};
    use crate::loader::LoaderOptions;
    use crate::source::MemorySource;
    use crate::surface::{Canvas, RecordingSurface, Rgba};

    const CATALOG: &str = r#"[{
        "family": "Licorice",
        "variants": ["regular"],
        "files": { "regular": "licorice.ttf" },
        "menu": "licorice.ttf"
    }]"#;

    fn renderer(engine: HeadlessEngine) -> TextRenderer<HeadlessEngine> {
        let catalog = Arc::new(FontCatalog::from_json(CATALOG).unwrap());
        let source = Arc::new(MemorySource::new().with_font(
            "licorice.ttf",
            HeadlessEngine::font_bytes(&[("Licorice", "Regular")]),
        ));
        let loader = FontLoader::new(catalog, source, engine).with_options(LoaderOptions {
            kerning_mode: KerningMode::Unfitted,
            ..LoaderOptions::default()
        });
        TextRenderer::new(Arc::new(loader))
    }

    fn request(text: &str) -> RenderRequest<'_> {
        RenderRequest {
            family: "Licorice",
            style: None,
            text,
            origin: PenPosition::new(20, 40),
            pixel_width: 0,
            pixel_height: 32,
        }
    }

    #[test]
    fn test_hi_ends_at_46() {
        let engine = HeadlessEngine::new().with_advance('H', 1280).with_advance('i', 384);
        let renderer = renderer(engine);
        let mut surface = RecordingSurface::new(640, 400);

        let pen = renderer.render(Some(&mut surface), &request("Hi")).unwrap();
        assert_eq!(pen, PenPosition::new(46, 40));

        // Headless boxes: bitmap_left 1, bitmap_top 24 at 32px.
        assert_eq!(surface.blits(), vec![(21, 16), (41, 16)]);
    }

    #[test]
    fn test_kerning_is_truncated_in_pixels() {
        let engine = HeadlessEngine::new().with_kerning('A', 'V', Vector26Dot6::new(150, 0));
        let renderer = renderer(engine);
        let run = renderer.layout(&request("AV")).unwrap();
        assert_eq!(run.glyphs[1].x, 20 + 10 + 2);
    }

    #[test]
    fn test_missing_char_contributes_nothing() {
        let engine = HeadlessEngine::new().with_missing('x');
        let renderer = renderer(engine);
        let run = renderer.layout(&request("axb")).unwrap();
        assert_eq!(run.skipped, 1);
        assert_eq!(
            run.glyphs.iter().map(|g| (g.ch, g.x)).collect::<Vec<_>>(),
            vec![('a', 20), ('b', 30)]
        );
    }

    #[test]
    fn test_no_surface_is_an_error_without_loading() {
        let renderer = renderer(HeadlessEngine::new());
        let result = renderer.render(None::<&mut Canvas>, &request("a"));
        assert_eq!(result, Err(RenderError::NoDrawingSurface));
        assert!(renderer.loader().loaded_keys().is_empty());
    }

    #[test]
    fn test_renders_ink_onto_canvas() {
        let renderer = renderer(HeadlessEngine::new());
        let mut canvas = Canvas::new(64, 48);
        renderer.render(Some(&mut canvas), &request("a")).unwrap();
        assert_eq!(canvas.pixel(21, 16), Some(Rgba::BLACK));
        assert_eq!(canvas.pixel(19, 16), Some(Rgba::WHITE));
    }
}
