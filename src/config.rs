// src/config.rs

//! Configuration for catalog location, font sources, rendering and defaults.
//!
//! Every struct deserializes with `#[serde(default)]`, so a config file only
//! needs the fields it changes. The process-wide `CONFIG` is read once from
//! the JSON file named by `GLYPHCAST_CONFIG`; without one, defaults apply.

use std::path::{Path, PathBuf};

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::DEFAULT_STYLE;
use crate::engine::KerningMode;
use crate::layout::LayoutOptions;
use crate::surface::Rgba;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GLYPHCAST_CONFIG";

/// Global configuration, loaded on first access.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match std::env::var_os(CONFIG_ENV) {
    Some(path) => Config::load(Path::new(&path)).unwrap_or_else(|e| {
        warn!("Config: {}; using defaults", e);
        Config::default()
    }),
    None => Config::default(),
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// --- Top-Level Configuration Structure ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Catalog JSON file. `None` uses the built-in catalog.
    pub catalog: Option<PathBuf>,
    pub source: SourceConfig,
    pub render: RenderConfig,
    pub defaults: DefaultsConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        info!("Config: loaded {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

// --- Font Sources ---

/// Where font bytes and web-font stylesheets come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Root for relative source ids read from disk.
    pub font_dir: Option<PathBuf>,
    /// HTTP base for relative source ids. Used only without `font_dir`.
    pub base_url: Option<String>,
    /// Prefix the family query is appended to.
    pub web_font_css_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Responses above this size are rejected.
    pub max_font_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            font_dir: None,
            base_url: Some("https://raw.githubusercontent.com/google/fonts/main".to_string()),
            web_font_css_url: "https://fonts.googleapis.com/css?family=".to_string(),
            user_agent: concat!("glyphcast/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_font_bytes: 32 * 1024 * 1024,
        }
    }
}

// --- Rendering ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Zero means "same as height".
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Multiplies both pixel dimensions.
    pub device_pixel_ratio: f32,
    /// Pen x at the start of a line.
    pub origin_x: i32,
    pub apply_vertical_kerning: bool,
    pub kerning_mode: KerningMode,
    /// 1-bit glyph bitmaps instead of 8-bit coverage.
    pub monochrome: bool,
    pub foreground: Rgba,
    pub background: Rgba,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            pixel_width: 0,
            pixel_height: 32,
            device_pixel_ratio: 1.0,
            origin_x: 20,
            apply_vertical_kerning: false,
            kerning_mode: KerningMode::Default,
            monochrome: true,
            foreground: Rgba::BLACK,
            background: Rgba::WHITE,
            surface_width: 640,
            surface_height: 400,
        }
    }
}

impl RenderConfig {
    /// `(width, height)` in device pixels.
    pub fn scaled_pixel_size(&self) -> (u32, u32) {
        let scale = |v: u32| (v as f32 * self.device_pixel_ratio).round() as u32;
        (scale(self.pixel_width), scale(self.pixel_height))
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            apply_vertical_kerning: self.apply_vertical_kerning,
        }
    }
}

// --- Defaults ---

/// Known-good selection used when loading the requested one fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsConfig {
    pub family: String,
    pub style: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            family: "Licorice".to_string(),
            style: DEFAULT_STYLE.to_string(),
        }
    }
}
