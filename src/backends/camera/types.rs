// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which camera the scanner should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraSelector {
    /// World-facing camera (the usual choice for scanning)
    #[default]
    Back,
    /// User-facing camera
    Front,
}

impl CameraSelector {
    pub fn from_front_flag(use_front_camera: bool) -> Self {
        if use_front_camera {
            CameraSelector::Front
        } else {
            CameraSelector::Back
        }
    }
}

impl std::fmt::Display for CameraSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSelector::Back => write!(f, "back"),
            CameraSelector::Front => write!(f, "front"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Frames are delivered in sensor orientation. The detector rotates them
/// upright before scanning, so codes held in front of a sideways-mounted
/// sensor still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorRotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from a degree value (normalised to 0-360)
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Where a camera sits on the device, when the driver tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraLocation {
    Front,
    Back,
    External,
}

impl CameraLocation {
    /// Guess the location from a device card name
    ///
    /// Laptop and phone drivers commonly put "front"/"user" or
    /// "rear"/"back"/"world" in the card name.
    pub fn from_card_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("front") || lower.contains("user") {
            Some(CameraLocation::Front)
        } else if lower.contains("rear") || lower.contains("back") || lower.contains("world") {
            Some(CameraLocation::Back)
        } else if lower.contains("usb") {
            Some(CameraLocation::External)
        } else {
            None
        }
    }

    pub fn matches(&self, selector: CameraSelector) -> bool {
        matches!(
            (self, selector),
            (CameraLocation::Front, CameraSelector::Front)
                | (CameraLocation::Back, CameraSelector::Back)
        )
    }
}

/// A camera device that can be opened by a backend
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human readable name (V4L2 card)
    pub name: String,
    /// Path of the capture node (e.g. /dev/video0)
    pub path: String,
    /// Driver name
    pub driver: String,
    pub location: Option<CameraLocation>,
    pub rotation: SensorRotation,
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Torch (continuous flash) state reported by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorchState {
    #[default]
    Off,
    On,
}

impl TorchState {
    pub fn is_on(&self) -> bool {
        matches!(self, TorchState::On)
    }
}

impl From<bool> for TorchState {
    fn from(on: bool) -> Self {
        if on { TorchState::On } else { TorchState::Off }
    }
}

/// A single RGBA camera frame
///
/// Frames are owned by the pipeline only for as long as analysis needs them;
/// the pixel buffer is reference counted so handing a frame to the analysis
/// worker never copies pixels.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly or loosely packed RGBA rows
    pub data: Arc<[u8]>,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub rotation: SensorRotation,
    /// Monotonic frame counter assigned by the backend
    pub sequence: u64,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a frame from tightly packed RGBA pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            stride: width * 4,
            rotation: SensorRotation::None,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Frame receiver type for analysis streams
pub type FrameReceiver = tokio::sync::mpsc::Receiver<CameraFrame>;

/// Frame sender type for analysis streams
pub type FrameSender = tokio::sync::mpsc::Sender<CameraFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Failed to open or configure the device
    InitializationFailed(String),
    /// Pixel format cannot be converted to RGBA
    FormatNotSupported(String),
    /// The camera stopped delivering frames for a while
    FrameTimeout,
    /// Camera disconnected during capture
    Disconnected,
    /// A finite frame source has delivered all of its frames
    StreamEnded,
    /// No flash unit to drive the torch
    NoFlashUnit,
    /// Operation requires a started camera
    NotStarted,
    /// General I/O error
    IoError(String),
}

impl BackendError {
    /// Transient conditions the session can live through
    pub fn is_resolvable(&self) -> bool {
        matches!(self, BackendError::FrameTimeout | BackendError::NoFlashUnit)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::FrameTimeout => write!(f, "Camera stopped delivering frames"),
            BackendError::Disconnected => write!(f, "Camera disconnected"),
            BackendError::StreamEnded => write!(f, "Frame source exhausted"),
            BackendError::NoFlashUnit => write!(f, "Camera has no flash unit"),
            BackendError::NotStarted => write!(f, "Camera is not started"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_normalises_degrees() {
        assert_eq!(SensorRotation::from_degrees(-90), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees(450), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees(45), SensorRotation::None);
        assert!(SensorRotation::Rotate270.swaps_dimensions());
        assert!(!SensorRotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_location_from_card_name() {
        assert_eq!(
            CameraLocation::from_card_name("ov5640 front camera"),
            Some(CameraLocation::Front)
        );
        assert_eq!(
            CameraLocation::from_card_name("Rear Sensor"),
            Some(CameraLocation::Back)
        );
        assert_eq!(CameraLocation::from_card_name("Integrated Camera"), None);
    }

    #[test]
    fn test_frame_from_rgba_is_tightly_packed() {
        let frame = CameraFrame::from_rgba(3, 2, vec![0; 24], 7);
        assert_eq!(frame.stride, 12);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.rotation, SensorRotation::None);
    }
}
