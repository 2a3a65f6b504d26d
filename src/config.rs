// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Stored as JSON below the user configuration directory. A missing file
//! means defaults; a malformed one is a configuration error.

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_FRAME_RATIO, MAX_FRAME_RATIO};
use crate::detector::{BarcodeFormat, FormatFilter};
use crate::errors::{AppResult, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a scanner session looks and behaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Accepted symbologies (QR codes by default, empty means all)
    pub formats: BTreeSet<BarcodeFormat>,
    /// Hint shown on the overlay
    pub overlay_text: Option<String>,
    /// Icon name shown on the overlay
    pub overlay_icon: Option<String>,
    /// Width of the viewfinder relative to its height
    pub horizontal_frame_ratio: f32,
    /// Signal each accepted scan
    pub haptic_feedback: bool,
    pub show_torch_toggle: bool,
    pub show_close_button: bool,
    pub use_front_camera: bool,
    /// Ask the host to keep the display awake while scanning
    pub keep_screen_on: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            formats: BTreeSet::from([BarcodeFormat::QrCode]),
            overlay_text: None,
            overlay_icon: None,
            horizontal_frame_ratio: DEFAULT_FRAME_RATIO,
            haptic_feedback: true,
            show_torch_toggle: false,
            show_close_button: false,
            use_front_camera: false,
            keep_screen_on: true,
        }
    }
}

impl ScannerConfig {
    /// Default location: `$XDG_CONFIG_HOME/code-scanner/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded scanner config");
        Ok(config.validate())
    }

    /// Load from the default location, or defaults when there is none
    pub fn load_default() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => {
                warn!("No user config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved scanner config");
        Ok(())
    }

    /// Normalize out-of-range values
    pub fn validate(mut self) -> Self {
        let ratio = self.horizontal_frame_ratio;
        self.horizontal_frame_ratio = if ratio.is_finite() {
            ratio.clamp(DEFAULT_FRAME_RATIO, MAX_FRAME_RATIO)
        } else {
            DEFAULT_FRAME_RATIO
        };
        if ratio != self.horizontal_frame_ratio {
            warn!(
                requested = ratio,
                used = self.horizontal_frame_ratio,
                "Frame ratio out of range"
            );
        }

        if self.formats.is_empty() {
            self.formats.insert(BarcodeFormat::All);
        }
        self
    }

    pub fn format_filter(&self) -> FormatFilter {
        FormatFilter::new(self.formats.iter().copied())
    }
}
