// SPDX-License-Identifier: GPL-3.0-only

//! Code Scanner - camera barcode scanning sessions
//!
//! The library drives one scanning screen: it starts a camera, feeds frames
//! to a barcode detector at most one at a time, and ends with a single
//! [`ScanResult`].
//!
//! # Architecture
//!
//! - [`backends`]: camera sources, torch LEDs and device permission
//! - [`detector`]: detector abstraction and the QR implementation
//! - [`analyzer`]: frame pacing and success latching
//! - [`session`]: the scanner session event loop
//! - [`content`]: classification of decoded text
//! - [`config`]: user configuration
//! - [`result`]: result codes and the result envelope
//!
//! # Example
//!
//! ```no_run
//! use code_scanner::backends::camera::V4l2Backend;
//! use code_scanner::{QrDetector, ScannerConfig, ScannerSession};
//! use std::sync::Arc;
//!
//! # async fn scan() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScannerConfig::load_default()?;
//! let detector = QrDetector::new(config.format_filter())?;
//! let session = ScannerSession::new(config, Box::new(V4l2Backend::new()), Arc::new(detector));
//! println!("{}", session.run().await);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod backends;
pub mod config;
pub mod constants;
pub mod content;
pub mod detector;
pub mod errors;
pub mod result;
pub mod session;

// Re-export commonly used types
pub use analyzer::{AnalyzerEvent, ScanCoordinator, ScanState, Submission};
pub use config::ScannerConfig;
pub use content::QrContent;
pub use detector::{Barcode, BarcodeDetector, BarcodeFormat, QrDetector};
pub use errors::{AppResult, ScanError};
pub use result::ScanResult;
pub use session::{ScannerAction, ScannerSession, SessionEvent, SessionHandle};
