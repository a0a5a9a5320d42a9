// src/view.rs

//! Interactive text view: a family/style/text selection drawn onto a surface.
//!
//! Drawing is split in two. `prepare` loads the selection (reverting to the
//! configured default family once if that fails) and lays the text out;
//! `commit` blits the result, but only if the selection has not changed since
//! `prepare` started. Every selection change bumps a generation counter, so a
//! slow load that finishes after the user moved on becomes a harmless cache
//! fill instead of overwriting the newer drawing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};

use crate::config::{DefaultsConfig, RenderConfig};
use crate::engine::{to_pixels, RasterEngine};
use crate::error::RenderError;
use crate::layout::{PenPosition, Run};
use crate::loader::FontLoader;
use crate::renderer::{draw_run, RenderRequest, TextRenderer};
use crate::surface::Surface;

/// Line height used when the first character has no glyph.
const FALLBACK_LINE_HEIGHT: i32 = 32;

const INITIAL_TEXT: &str = "Hello World!";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    family: String,
    style: String,
    text: String,
    generation: u64,
}

/// A laid-out draw waiting to be committed.
#[derive(Debug, Clone)]
pub struct PreparedDraw {
    generation: u64,
    run: Run,
    line_height: i32,
}

impl PreparedDraw {
    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn line_height(&self) -> i32 {
        self.line_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn { pen: PenPosition, line_height: i32 },
    /// The selection changed after the draw was prepared; nothing was drawn.
    Stale,
    /// No surface attached; nothing was loaded or drawn.
    NoSurface,
}

pub struct TextView<E: RasterEngine, S: Surface> {
    renderer: TextRenderer<E>,
    surface: Mutex<Option<S>>,
    selection: Mutex<Selection>,
    render: RenderConfig,
    defaults: DefaultsConfig,
}

impl<E: RasterEngine, S: Surface> TextView<E, S> {
    pub fn new(loader: Arc<FontLoader<E>>, render: RenderConfig, defaults: DefaultsConfig) -> Self {
        let renderer = TextRenderer::new(loader).with_layout_options(render.layout_options());
        let selection = Selection {
            family: defaults.family.clone(),
            style: defaults.style.clone(),
            text: INITIAL_TEXT.to_string(),
            generation: 0,
        };
        Self {
            renderer,
            surface: Mutex::new(None),
            selection: Mutex::new(selection),
            render,
            defaults,
        }
    }

    pub fn with_surface(self, surface: S) -> Self {
        *self.lock_surface() = Some(surface);
        self
    }

    fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_surface(&self) -> MutexGuard<'_, Option<S>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn attach_surface(&self, surface: S) -> Option<S> {
        self.lock_surface().replace(surface)
    }

    pub fn take_surface(&self) -> Option<S> {
        self.lock_surface().take()
    }

    /// Run `f` on the attached surface, if any.
    pub fn inspect_surface<R>(&self, f: impl FnOnce(Option<&S>) -> R) -> R {
        f(self.lock_surface().as_ref())
    }

    pub fn family(&self) -> String {
        self.lock_selection().family.clone()
    }

    pub fn style(&self) -> String {
        self.lock_selection().style.clone()
    }

    pub fn text(&self) -> String {
        self.lock_selection().text.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock_selection().generation
    }

    /// Apply `f` and bump the generation. Returns the new generation.
    fn update(&self, f: impl FnOnce(&mut Selection)) -> u64 {
        let mut selection = self.lock_selection();
        f(&mut selection);
        selection.generation += 1;
        selection.generation
    }

    pub fn set_text(&self, text: &str) {
        self.update(|s| s.text = text.to_string());
    }

    pub fn set_style(&self, style: &str) {
        self.update(|s| s.style = style.to_string());
    }

    /// Switch family, unloading the previous selection.
    ///
    /// The current style is kept when the new family declares it, otherwise
    /// the family's first variant is used. Unknown families are ignored.
    pub fn set_family(&self, family: &str) {
        let loader = self.renderer.loader();
        let (old_family, old_style) = {
            let s = self.lock_selection();
            (s.family.clone(), s.style.clone())
        };
        if let Err(e) = loader.unload(&old_family, Some(&old_style)) {
            debug!("TextView: nothing to unload for {} / {}: {}", old_family, old_style, e);
        }

        let Some(info) = loader.catalog().lookup(family) else {
            warn!("TextView: unknown family '{}' ignored", family);
            return;
        };
        let style = match info.variants.first() {
            _ if info.supports(&old_style) => old_style,
            Some(first) => first.clone(),
            None => old_style,
        };
        let family = info.family.clone();
        info!("TextView: family -> {} / {}", family, style);
        self.update(|s| {
            s.family = family;
            s.style = style;
        });
    }

    fn layout_selection(&self, selection: &Selection) -> Result<(Run, i32), RenderError> {
        let (pixel_width, pixel_height) = self.render.scaled_pixel_size();
        let request = RenderRequest {
            family: &selection.family,
            style: Some(&selection.style),
            text: &selection.text,
            origin: PenPosition::default(),
            pixel_width,
            pixel_height,
        };
        let origin_x = self.render.origin_x;
        let mut line_height = FALLBACK_LINE_HEIGHT;
        let run = self.renderer.layout_from(&request, |entries| {
            if let Some(first) = entries.first().and_then(Option::as_ref) {
                line_height = to_pixels(first.metrics.height);
            }
            PenPosition::new(origin_x, 2 * line_height)
        })?;
        Ok((run, line_height))
    }

    /// Load and lay out the current selection.
    ///
    /// If the selected font can't be obtained, the view reverts to the
    /// default family/style and tries once more. Other failures are returned
    /// with the selection left as is.
    pub fn prepare(&self) -> Result<PreparedDraw, RenderError> {
        let selection = self.lock_selection().clone();
        match self.layout_selection(&selection) {
            Ok((run, line_height)) => Ok(PreparedDraw {
                generation: selection.generation,
                run,
                line_height,
            }),
            Err(RenderError::Load(e)) if e.is_unavailable_font() => {
                warn!(
                    "TextView: failed to load {} / {}: {}; reverting to {} / {}",
                    selection.family, selection.style, e, self.defaults.family, self.defaults.style
                );
                self.prepare_default(selection.text)
            }
            Err(e) => Err(e),
        }
    }

    fn prepare_default(&self, text: String) -> Result<PreparedDraw, RenderError> {
        let family = self.defaults.family.clone();
        let style = self.defaults.style.clone();
        let generation = self.update(|s| {
            s.family = family.clone();
            s.style = style.clone();
        });
        let selection = Selection {
            family,
            style,
            text,
            generation,
        };

        match self.layout_selection(&selection) {
            Ok((run, line_height)) => Ok(PreparedDraw {
                generation,
                run,
                line_height,
            }),
            Err(e) => {
                error!("TextView: default font failed too: {}", e);
                Err(e)
            }
        }
    }

    /// Draw a prepared layout if it still matches the current selection.
    pub fn commit(&self, prepared: &PreparedDraw) -> DrawOutcome {
        let selection = self.lock_selection();
        if selection.generation != prepared.generation {
            debug!(
                "TextView: dropping stale draw (generation {} != {})",
                prepared.generation, selection.generation
            );
            return DrawOutcome::Stale;
        }
        let mut surface = self.lock_surface();
        let Some(surface) = surface.as_mut() else {
            return DrawOutcome::NoSurface;
        };
        surface.clear(self.render.background);
        draw_run(surface, &prepared.run);
        DrawOutcome::Drawn {
            pen: prepared.run.pen,
            line_height: prepared.line_height,
        }
    }

    /// Prepare and commit. A view without a surface does nothing.
    pub fn redraw(&self) -> Result<DrawOutcome, RenderError> {
        if self.lock_surface().is_none() {
            return Ok(DrawOutcome::NoSurface);
        }
        let prepared = self.prepare()?;
        Ok(self.commit(&prepared))
    }
}
