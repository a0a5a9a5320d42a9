// src/source/mod.rs

//! Font byte sources.
//!
//! A `FontSourceProvider` turns a `SourceId` into raw font bytes, and can
//! optionally resolve a web-font family query into the font file ids listed
//! by its stylesheet. Providers are injected into the `FontLoader` at
//! construction; nothing checks for them at call time.
//!
//! - `FileSource` - local files (`file://` URLs, absolute or root-relative paths)
//! - `HttpSource` - HTTP(S) fetches and stylesheet resolution
//! - `RoutingSource` - picks HTTP or file access per id
//! - `MemorySource` - in-memory bytes, used for embedding and tests

mod file;
mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;

use crate::catalog::SourceId;
use crate::config::SourceConfig;
use crate::error::SourceError;

pub use file::FileSource;
pub use http::{extract_stylesheet_urls, HttpSource};

/// Provider of font bytes.
pub trait FontSourceProvider: Send + Sync {
    /// Fetch the raw bytes of one font file.
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError>;

    /// Resolve a web-font family query to the font files its stylesheet lists.
    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        Err(SourceError::ResolutionFailed {
            query: family_query.to_string(),
            reason: "this source cannot resolve web fonts".to_string(),
        })
    }
}

impl<P: FontSourceProvider + ?Sized> FontSourceProvider for Box<P> {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        (**self).fetch_bytes(source)
    }

    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        (**self).resolve_web_font(family_query)
    }
}

impl<P: FontSourceProvider + ?Sized> FontSourceProvider for Arc<P> {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        (**self).fetch_bytes(source)
    }

    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        (**self).resolve_web_font(family_query)
    }
}

fn is_http(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

// ═══════════════════════════════════════════════════════════════════════════
// RoutingSource
// ═══════════════════════════════════════════════════════════════════════════

/// Sends `http(s)://` ids (and relative ids, when a base URL is configured)
/// to HTTP, everything else to the file system.
pub struct RoutingSource {
    http: HttpSource,
    files: FileSource,
    relative_over_http: bool,
}

impl RoutingSource {
    pub fn new(http: HttpSource, files: FileSource, relative_over_http: bool) -> Self {
        Self {
            http,
            files,
            relative_over_http,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let files = FileSource::new(config.font_dir.clone());
        let http = HttpSource::from_config(config);
        Self::new(http, files, config.base_url.is_some() && config.font_dir.is_none())
    }

    fn wants_http(&self, id: &str) -> bool {
        if is_http(id) {
            return true;
        }
        let relative = !id.starts_with("file://") && !std::path::Path::new(id).is_absolute();
        relative && self.relative_over_http
    }
}

impl FontSourceProvider for RoutingSource {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        if self.wants_http(source.as_str()) {
            self.http.fetch_bytes(source)
        } else {
            self.files.fetch_bytes(source)
        }
    }

    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        self.http.resolve_web_font(family_query)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MemorySource
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory font bytes and stylesheet answers.
///
/// Counts fetches per id and can delay every fetch, which makes it the
/// natural provider for exercising cache and deduplication behaviour.
#[derive(Default)]
pub struct MemorySource {
    fonts: HashMap<SourceId, Arc<[u8]>>,
    stylesheets: HashMap<String, Vec<SourceId>>,
    latency: Option<Duration>,
    fetches: Mutex<HashMap<SourceId, usize>>,
    total_fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, id: impl Into<SourceId>, bytes: impl Into<Vec<u8>>) -> Self {
        self.fonts.insert(id.into(), Arc::from(bytes.into()));
        self
    }

    /// Answer `query` with the given font ids, as a stylesheet would.
    pub fn with_stylesheet(mut self, query: &str, ids: Vec<SourceId>) -> Self {
        self.stylesheets.insert(query.to_string(), ids);
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fetch_count(&self, id: &SourceId) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total_fetches.load(Ordering::SeqCst)
    }
}

impl FontSourceProvider for MemorySource {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        self.total_fetches.fetch_add(1, Ordering::SeqCst);
        *self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(source.clone())
            .or_insert(0) += 1;

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        debug!("MemorySource: fetch '{}'", source);
        self.fonts
            .get(source)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| SourceError::FetchFailed {
                source_id: source.clone(),
                reason: "not found".to_string(),
            })
    }

    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        self.stylesheets
            .get(family_query)
            .cloned()
            .ok_or_else(|| SourceError::ResolutionFailed {
                query: family_query.to_string(),
                reason: "no stylesheet".to_string(),
            })
    }
}
