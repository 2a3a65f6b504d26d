// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner
//!
//! Errors fall into two classes only. A *resolvable* error describes a
//! transient condition (the detector is still warming up, the camera skipped
//! frames); the session records it as the pending result but stays open.
//! Every other error is *fatal* and ends the session with that error as its
//! result. Nothing is retried here; retry policy belongs to the caller.

use crate::backends::camera::BackendError;
use crate::detector::DetectorError;
use std::fmt;

/// Result type alias using ScanError
pub type AppResult<T> = Result<T, ScanError>;

/// Main scanner error type
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Camera pipeline errors
    Camera(BackendError),
    /// Barcode detector errors
    Detector(DetectorError),
    /// Invalid or unreadable configuration
    Config(String),
    /// Filesystem errors
    Io(String),
}

impl ScanError {
    /// Whether the session may stay open after reporting this error
    pub fn is_resolvable(&self) -> bool {
        match self {
            ScanError::Camera(e) => e.is_resolvable(),
            ScanError::Detector(e) => e.is_resolvable(),
            ScanError::Config(_) | ScanError::Io(_) => false,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Camera(e) => write!(f, "Camera error: {}", e),
            ScanError::Detector(e) => write!(f, "Detector error: {}", e),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Camera(e) => Some(e),
            ScanError::Detector(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::Camera(err)
    }
}

impl From<DetectorError> for ScanError {
    fn from(err: DetectorError) -> Self {
        ScanError::Detector(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_warmup_is_resolvable() {
        let err = ScanError::from(DetectorError::Unavailable("model loading".into()));
        assert!(err.is_resolvable());
    }

    #[test]
    fn test_config_error_is_fatal() {
        assert!(!ScanError::Config("bad".into()).is_resolvable());
        assert!(!ScanError::from(BackendError::DeviceNotFound("none".into())).is_resolvable());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = ScanError::from(BackendError::FrameTimeout);
        assert!(err.to_string().starts_with("Camera error"));
    }
}
