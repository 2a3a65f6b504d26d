// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner only needs a narrow slice of a camera pipeline: start
//! streaming RGBA frames from the selected camera, stop again, and drive the
//! torch when the device has a flash unit.
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScannerSession    │
//! └──────────┬──────────┘
//!            │ start / stop / torch
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │
//! └──────────┬──────────┘
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌──────┐  ┌────────────┐
//!   │ V4L2 │  │ StillImage │
//!   └──────┘  └────────────┘
//! ```

pub mod format_converters;
pub mod still_image;
pub mod types;
pub mod v4l2;

pub use still_image::StillImageBackend;
pub use types::*;
pub use v4l2::{V4l2Backend, enumerate_cameras};

/// Camera pipeline used by a scanner session
pub trait CameraBackend: Send {
    /// Open the selected camera and start streaming frames
    ///
    /// The backend picks the supported resolution closest to `target`
    /// (see [`select_resolution`]). Frames that arrive while the receiver is
    /// full are dropped by the backend, so a slow consumer always sees
    /// recent frames.
    fn start(
        &mut self,
        selector: CameraSelector,
        target: Resolution,
    ) -> BackendResult<FrameReceiver>;

    /// Stop streaming and release the device
    ///
    /// Stopping an already stopped backend is not an error.
    fn stop(&mut self) -> BackendResult<()>;

    /// Whether frames are currently being produced
    fn is_running(&self) -> bool;

    /// Whether the opened camera can drive a torch
    fn has_flash_unit(&self) -> bool;

    /// Switch the torch on or off, returning the resulting state
    fn enable_torch(&mut self, enabled: bool) -> BackendResult<TorchState>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Pick the supported resolution closest to `target`
///
/// Candidates at least as large as the target (in both dimensions) win; among
/// them the smallest is chosen. When none is large enough the biggest smaller
/// candidate is used instead.
pub fn select_resolution(available: &[Resolution], target: Resolution) -> Option<Resolution> {
    let higher = available
        .iter()
        .filter(|r| r.width >= target.width && r.height >= target.height)
        .min_by_key(|r| r.pixels());

    if let Some(found) = higher {
        return Some(*found);
    }

    available.iter().max_by_key(|r| r.pixels()).copied()
}
