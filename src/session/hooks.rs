// SPDX-License-Identifier: GPL-3.0-only

//! Host-supplied hooks invoked by a running session

use crate::detector::Barcode;
use futures::future::BoxFuture;
use std::io::Write;
use tracing::debug;

/// What to do after a code was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerAction {
    /// End the session with the accepted code
    CloseScanner,
    /// Discard the code and keep scanning
    ContinueScanning,
    /// Show the message; scanning resumes once the host dismisses it
    Error(String),
}

/// Decides, possibly asynchronously, what happens with each accepted code
pub trait SuccessActionProvider: Send + Sync {
    fn on_success(&self, barcode: &Barcode) -> BoxFuture<'static, ScannerAction>;
}

/// Short tactile or audible confirmation of a scan
pub trait HapticFeedback: Send + Sync {
    fn perform(&self);
}

/// Does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl HapticFeedback for NoHaptics {
    fn perform(&self) {}
}

/// Rings the terminal bell on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl HapticFeedback for TerminalBell {
    fn perform(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            debug!(error = %e, "Failed to ring terminal bell");
        }
    }
}
