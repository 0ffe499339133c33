//! Engine settings file.
//!
//! Settings are plain JSON, versioned, and every field has a default so older
//! files keep loading after new options are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{SETTINGS_VERSION, canvas, mask, pointer};
use crate::error::{LabelerError, Result};
use crate::state::CursorOptions;

/// Log level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Tunables for the editing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelerSettings {
    pub version: u32,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Corner/vertex grab distance (screen px)
    #[serde(default = "default_hit_tolerance")]
    pub hit_tolerance: f64,

    /// Distance to the first vertex that closes a polygon (screen px)
    #[serde(default = "default_close_tolerance")]
    pub polygon_close_tolerance: f64,

    /// Mask brush radius (screen px)
    #[serde(default = "default_brush_radius")]
    pub brush_radius: f64,

    /// Used when the host does not send `maxCanvasSize`
    #[serde(default = "default_max_canvas_size")]
    pub max_canvas_size: u32,
}

fn default_hit_tolerance() -> f64 {
    pointer::HIT_TOLERANCE
}

fn default_close_tolerance() -> f64 {
    pointer::POLYGON_CLOSE_TOLERANCE
}

fn default_brush_radius() -> f64 {
    mask::BRUSH_RADIUS
}

fn default_max_canvas_size() -> u32 {
    canvas::DEFAULT_MAX_SIZE
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            log_level: LogLevel::default(),
            hit_tolerance: default_hit_tolerance(),
            polygon_close_tolerance: default_close_tolerance(),
            brush_radius: default_brush_radius(),
            max_canvas_size: default_max_canvas_size(),
        }
    }
}

impl LabelerSettings {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse settings, rejecting files from a newer version.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        if settings.version > SETTINGS_VERSION {
            return Err(LabelerError::SettingsVersion {
                found: settings.version,
                supported: SETTINGS_VERSION,
            });
        }
        Ok(settings)
    }

    pub fn default_filename() -> &'static str {
        "labeler-settings.json"
    }

    /// Default settings location, `None` when no config directory is known.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .map(|dir| dir.join("labeler").join(Self::default_filename()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load from `path`, falling back to defaults when missing or broken.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No settings file at {:?}", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Ignoring settings file {:?}: {}", path, e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn cursor_options(&self) -> CursorOptions {
        CursorOptions {
            hit_tolerance: self.hit_tolerance,
            close_tolerance: self.polygon_close_tolerance,
            brush_radius: self.brush_radius,
        }
    }
}
