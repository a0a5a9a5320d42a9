// src/glyph_cache.rs

//! Per-(family, style) glyph caches.
//!
//! A `GlyphCache` maps characters to the `GlyphEntry` the engine produced for
//! them at one pixel size. Population goes through an `EngineSession`, so the
//! face and size the entries were rasterized with are always the ones the
//! session selected. Characters the engine cannot load are logged and left
//! out; they stay misses and are requested again on the next population.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, trace, warn};

use crate::catalog::SourceId;
use crate::context::EngineSession;
use crate::engine::{FaceHandle, GlyphEntry, LoadFlags, RasterEngine};

/// Normalized (family, resolved style) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphCacheKey {
    pub family: String,
    pub style: String,
}

impl GlyphCacheKey {
    pub fn new(family: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            style: style.into(),
        }
    }
}

impl fmt::Display for GlyphCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.family, self.style)
    }
}

/// Glyphs of one loaded (family, style).
#[derive(Debug, Clone)]
pub struct GlyphCache {
    key: GlyphCacheKey,
    source: SourceId,
    face: FaceHandle,
    flags: LoadFlags,
    /// `(x_ppem, y_ppem)` the entries were loaded at.
    pixel_size: Option<(u32, u32)>,
    entries: HashMap<char, GlyphEntry>,
}

impl GlyphCache {
    pub fn new(key: GlyphCacheKey, source: SourceId, face: FaceHandle, flags: LoadFlags) -> Self {
        Self {
            key,
            source,
            face,
            flags,
            pixel_size: None,
            entries: HashMap::new(),
        }
    }

    pub fn key(&self) -> &GlyphCacheKey {
        &self.key
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    /// Face selected for every population of this cache.
    pub fn face(&self) -> &FaceHandle {
        &self.face
    }

    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        self.pixel_size
    }

    pub fn get(&self, ch: char) -> Option<&GlyphEntry> {
        self.entries.get(&ch)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct characters of `text` with no entry, in first-seen order.
    pub fn missing(&self, text: &str) -> Vec<char> {
        let mut seen = HashSet::new();
        text.chars()
            .filter(|ch| !self.entries.contains_key(ch) && seen.insert(*ch))
            .collect()
    }

    /// Load every missing character of `text` through `session`.
    ///
    /// Each distinct missing character is requested once. If the session's
    /// size differs from the size the cache was filled at, the cache is
    /// emptied first. Returns how many entries were added.
    pub fn ensure_populated<E: RasterEngine>(
        &mut self,
        session: &mut EngineSession<'_, E>,
        text: &str,
    ) -> usize {
        let metrics = session.metrics();
        let size = (metrics.x_ppem, metrics.y_ppem);
        if self.pixel_size != Some(size) {
            if !self.entries.is_empty() {
                debug!(
                    "GlyphCache: {} size changed {:?} -> {:?}, dropping {} glyph(s)",
                    self.key,
                    self.pixel_size,
                    size,
                    self.entries.len()
                );
                self.entries.clear();
            }
            self.pixel_size = Some(size);
        }

        let missing = self.missing(text);
        if missing.is_empty() {
            trace!("GlyphCache: {} all {} char(s) cached", self.key, text.chars().count());
            return 0;
        }

        let mut added = 0;
        for (ch, result) in session.load_glyphs(&missing, self.flags) {
            match result {
                Ok(entry) => {
                    self.entries.insert(ch, entry);
                    added += 1;
                }
                Err(e) => warn!(
                    "GlyphCache: failed to load '{}' (U+{:04X}) for {}: {}",
                    ch, ch as u32, self.key, e
                ),
            }
        }
        debug!(
            "GlyphCache: {} cached {}/{} new glyph(s)",
            self.key,
            added,
            missing.len()
        );
        added
    }

    /// One slot per character of `text`, in order; `None` for misses.
    pub fn lookup_run(&self, text: &str) -> Vec<Option<GlyphEntry>> {
        text.chars().map(|ch| self.entries.get(&ch).cloned()).collect()
    }
}
