// src/source/file.rs

use std::path::{Path, PathBuf};

use log::debug;

use super::FontSourceProvider;
use crate::catalog::SourceId;
use crate::error::SourceError;

/// Reads font files from the local file system.
///
/// Accepts `file://` URLs and absolute paths as-is. Relative ids are joined to
/// the configured root, or to the working directory when there is none.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn path_for(&self, source: &SourceId) -> PathBuf {
        let id = source.as_str();
        let raw = Path::new(id.strip_prefix("file://").unwrap_or(id));
        match &self.root {
            Some(root) if raw.is_relative() => root.join(raw),
            _ => raw.to_path_buf(),
        }
    }
}

impl FontSourceProvider for FileSource {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        let path = self.path_for(source);
        debug!("FileSource: reading {}", path.display());
        std::fs::read(&path).map_err(|e| SourceError::FetchFailed {
            source_id: source.clone(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}
