//! Reader configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```
//! let config = scrollbook::ReaderConfig::from_json_str(r#"{ "fill_factor": 2.0 }"#).unwrap();
//! assert_eq!(config.fill_factor, 2.0);
//! assert_eq!(config.forward_threshold, 800.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How extracted images are exposed to the rendering surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Register bytes in the blob store and reference them by handle.
    #[default]
    Handles,
    /// Inline the bytes as base64 `data:` URIs.
    DataUri,
}

/// Layout model of the headless surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMetrics {
    pub viewport_height: f64,
    pub chars_per_line: usize,
    pub line_height: f64,
    pub image_height: f64,
    /// Vertical space around each chapter block.
    pub block_padding: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            viewport_height: 800.0,
            chars_per_line: 60,
            line_height: 24.0,
            image_height: 320.0,
            block_padding: 48.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Distance from the content bottom that triggers ExtendForward.
    pub forward_threshold: f64,
    /// Distance from the content top that triggers ExtendBackward.
    pub backward_threshold: f64,
    /// Minimum content extent after a jump, in viewport heights.
    pub fill_factor: f64,
    /// Visible ratio a block needs to count as dominant.
    pub visibility_threshold: f64,
    pub progress_throttle_ms: u64,
    pub fragment_scroll_delay_ms: u64,
    pub history_restore_delay_ms: u64,
    pub search_max_results: usize,
    /// Characters of context on each side of a search match.
    pub search_snippet_radius: usize,
    pub image_mode: ImageMode,
    pub metrics: TextMetrics,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            forward_threshold: 800.0,
            backward_threshold: 200.0,
            fill_factor: 1.5,
            visibility_threshold: 0.1,
            progress_throttle_ms: 5_000,
            fragment_scroll_delay_ms: 100,
            history_restore_delay_ms: 50,
            search_max_results: 50,
            search_snippet_radius: 40,
            image_mode: ImageMode::Handles,
            metrics: TextMetrics::default(),
        }
    }
}

impl ReaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
