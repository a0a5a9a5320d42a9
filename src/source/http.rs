// src/source/http.rs

//! HTTP font fetching and web-font stylesheet resolution.

use std::time::Duration;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::FontSourceProvider;
use crate::catalog::SourceId;
use crate::config::SourceConfig;
use crate::error::SourceError;

/// Stylesheets are small; anything past this is not a stylesheet.
const MAX_STYLESHEET_BYTES: u64 = 1024 * 1024;

/// `url(...)` references in a stylesheet.
static STYLESHEET_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"url\(([^()]+)\)").expect("stylesheet url regex is valid"));

/// Every `url(...)` target in `css`, in document order, unquoted.
pub fn extract_stylesheet_urls(css: &str) -> Vec<String> {
    STYLESHEET_URL_RE
        .captures_iter(css)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Font URLs of `css`, resolved against the URL the stylesheet was served
/// from. References that resolve to anything but http(s) are dropped.
pub fn resolve_stylesheet_urls(stylesheet_url: &str, css: &str) -> Result<Vec<String>, String> {
    let base = Url::parse(stylesheet_url)
        .map_err(|e| format!("invalid stylesheet url '{stylesheet_url}': {e}"))?;
    Ok(extract_stylesheet_urls(css)
        .into_iter()
        .filter_map(|reference| match base.join(&reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
            Ok(url) => {
                debug!("HttpSource: skipping non-HTTP font url '{}'", url);
                None
            }
            Err(e) => {
                debug!("HttpSource: skipping font url '{}': {}", reference, e);
                None
            }
        })
        .collect())
}

/// Fetches fonts and stylesheets over HTTP(S).
#[derive(Clone)]
pub struct HttpSource {
    agent: ureq::Agent,
    base_url: Option<String>,
    css_url: String,
    user_agent: String,
    max_font_bytes: u64,
}

impl HttpSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.clone(),
            css_url: config.web_font_css_url.clone(),
            user_agent: config.user_agent.clone(),
            max_font_bytes: config.max_font_bytes,
        }
    }

    /// Absolute URL for `source`, joining relative ids to the base URL.
    pub fn url_for(&self, source: &SourceId) -> String {
        let id = source.as_str();
        if id.starts_with("http://") || id.starts_with("https://") {
            return id.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                id.trim_start_matches('/')
            ),
            None => id.to_string(),
        }
    }

    /// Stylesheet URL for a family query. Spaces become `+`.
    pub fn stylesheet_url(&self, family_query: &str) -> String {
        format!("{}{}", self.css_url, family_query.trim().replace(' ', "+"))
    }

    fn get(&self, url: &str, limit: u64) -> Result<Vec<u8>, String> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| e.to_string())?;
        response
            .body_mut()
            .with_config()
            .limit(limit)
            .read_to_vec()
            .map_err(|e| e.to_string())
    }
}

impl FontSourceProvider for HttpSource {
    fn fetch_bytes(&self, source: &SourceId) -> Result<Vec<u8>, SourceError> {
        let url = self.url_for(source);
        debug!("HttpSource: GET {}", url);
        let bytes = self
            .get(&url, self.max_font_bytes)
            .map_err(|reason| SourceError::FetchFailed {
                source_id: source.clone(),
                reason,
            })?;
        if bytes.is_empty() {
            return Err(SourceError::FetchFailed {
                source_id: source.clone(),
                reason: "empty response body".to_string(),
            });
        }
        debug!("HttpSource: {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    fn resolve_web_font(&self, family_query: &str) -> Result<Vec<SourceId>, SourceError> {
        let url = self.stylesheet_url(family_query);
        info!("HttpSource: resolving web font '{}'", family_query);
        let resolution_failed = |reason: String| SourceError::ResolutionFailed {
            query: family_query.to_string(),
            reason,
        };

        let body = self.get(&url, MAX_STYLESHEET_BYTES).map_err(resolution_failed)?;
        let css = String::from_utf8(body)
            .map_err(|e| resolution_failed(format!("stylesheet is not UTF-8: {e}")))?;
        let urls = resolve_stylesheet_urls(&url, &css).map_err(resolution_failed)?;
        if urls.is_empty() {
            return Err(resolution_failed("stylesheet references no fonts".to_string()));
        }
        debug!("HttpSource: '{}' references {} font files", family_query, urls.len());
        Ok(urls.into_iter().map(SourceId::from).collect())
    }
}
