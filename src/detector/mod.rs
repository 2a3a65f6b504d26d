// SPDX-License-Identifier: GPL-3.0-only

//! Barcode detection
//!
//! The detector is an external collaborator: it takes a frame and
//! asynchronously yields zero or more decoded codes, or an error. The
//! scanner never decodes symbols itself.

pub mod qr_detector;
pub mod types;

pub use qr_detector::QrDetector;
pub use types::{
    Barcode, BarcodeFormat, DetectorError, FormatFilter, FrameRegion, ValueType,
};

use crate::backends::camera::CameraFrame;
use futures::future::BoxFuture;

/// Outcome of one detector pass
pub type DetectionOutcome = Result<Vec<Barcode>, DetectorError>;

/// Image-to-barcode decoder
pub trait BarcodeDetector: Send + Sync + 'static {
    /// Analyze one frame
    ///
    /// The returned future must not borrow the detector so it can run on the
    /// analysis worker while the session keeps its own handle.
    fn detect(&self, frame: CameraFrame) -> BoxFuture<'static, DetectionOutcome>;

    /// Symbologies this detector was configured for
    fn formats(&self) -> &FormatFilter;
}
