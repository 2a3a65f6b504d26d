// SPDX-License-Identifier: GPL-3.0-only

//! Presentation state of the scanner overlay
//!
//! The session only describes what the overlay should show; drawing it is up
//! to the host, which receives a fresh copy on every change.

use crate::config::ScannerConfig;
use crate::detector::FrameRegion;
use serde::Serialize;

/// Share of the shorter preview side covered by the viewfinder
const VIEWFINDER_SCALE: f32 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayState {
    pub visible: bool,
    /// A code was just accepted
    pub highlighted: bool,
    /// The last pass failed; show a busy indicator
    pub loading: bool,
    pub torch_visible: bool,
    pub torch_on: bool,
    pub close_visible: bool,
    pub text: Option<String>,
    pub icon: Option<String>,
    /// Viewfinder width relative to its height
    pub frame_ratio: f32,
}

impl OverlayState {
    /// Hidden overlay styled from `config`
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            visible: false,
            highlighted: false,
            loading: false,
            torch_visible: false,
            torch_on: false,
            close_visible: config.show_close_button,
            text: config.overlay_text.clone(),
            icon: config.overlay_icon.clone(),
            frame_ratio: config.horizontal_frame_ratio,
        }
    }

    /// Centered viewfinder rectangle for a preview of the given size
    ///
    /// The height is a fixed share of the shorter side; the width follows the
    /// frame ratio but never exceeds the preview.
    pub fn viewfinder(&self, preview_width: u32, preview_height: u32) -> Option<FrameRegion> {
        if preview_width == 0 || preview_height == 0 {
            return None;
        }

        let (pw, ph) = (preview_width as f32, preview_height as f32);
        let height = pw.min(ph) * VIEWFINDER_SCALE;
        let width = (height * self.frame_ratio.max(1.0)).min(pw);

        Some(FrameRegion {
            x: (pw - width) / 2.0 / pw,
            y: (ph - height) / 2.0 / ph,
            width: width / pw,
            height: height / ph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = ScannerConfig {
            show_close_button: true,
            overlay_text: Some("Scan the ticket".into()),
            ..Default::default()
        };
        let overlay = OverlayState::from_config(&config);
        assert!(!overlay.visible);
        assert!(overlay.close_visible);
        assert!(!overlay.torch_visible);
        assert_eq!(overlay.text.as_deref(), Some("Scan the ticket"));
    }

    #[test]
    fn test_square_viewfinder() {
        let overlay = OverlayState::from_config(&ScannerConfig::default());
        let region = overlay.viewfinder(1000, 500).unwrap();
        assert!((region.height - 0.75).abs() < 0.001);
        assert!((region.width - 0.375).abs() < 0.001);
        assert!((region.x - 0.3125).abs() < 0.001);
    }

    #[test]
    fn test_wide_viewfinder_is_capped() {
        let mut overlay = OverlayState::from_config(&ScannerConfig::default());
        overlay.frame_ratio = 3.0;
        let region = overlay.viewfinder(400, 800).unwrap();
        assert!((region.width - 1.0).abs() < 0.001);
        assert_eq!(region.x, 0.0);
        assert!(overlay.viewfinder(0, 10).is_none());
    }
}
