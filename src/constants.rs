// SPDX-License-Identifier: GPL-3.0-only

//! Scanner-wide constants

use std::time::Duration;

/// Resolution requested from the camera for analysis frames
///
/// The backend picks the closest supported size, preferring larger ones
/// (see [`crate::backends::camera::select_resolution`]).
pub const TARGET_RESOLUTION: (u32, u32) = (1280, 720);

/// Frames are downscaled to this maximum dimension before detection
pub const MAX_DETECTION_DIMENSION: u32 = 640;

/// Capacity of the camera -> session frame channel
///
/// Kept tiny so stale frames are dropped at the producer instead of queueing.
pub const FRAME_CHANNEL_CAPACITY: usize = 2;

/// Number of mmap buffers requested from V4L2 devices
pub const V4L2_BUFFER_COUNT: u32 = 4;

/// Longest a V4L2 capture thread waits for a buffer before rechecking
/// whether it should stop
pub const CAPTURE_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// How long a live camera may go without delivering a frame before the
/// session reports a (resolvable) frame timeout
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between frames replayed by the still image backend
pub const STILL_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Default horizontal ratio of the overlay viewfinder (square)
pub const DEFAULT_FRAME_RATIO: f32 = 1.0;

/// Upper bound for the overlay viewfinder ratio
pub const MAX_FRAME_RATIO: f32 = 3.0;

/// Directory name used below the user configuration directory
pub const CONFIG_DIR_NAME: &str = "code-scanner";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Result codes reported to the invoking host
///
/// These follow the activity result convention the scanner screen was
/// designed for: `OK` and `CANCELED` are the platform codes, the remaining
/// ones start after the first user code.
pub mod result_codes {
    /// A barcode was scanned and accepted
    pub const OK: i32 = -1;
    /// The user closed the scanner without a result
    pub const CANCELED: i32 = 0;
    /// First code available for custom results
    pub const FIRST_USER: i32 = 1;
    /// Camera permission was not granted
    pub const MISSING_PERMISSION: i32 = FIRST_USER + 1;
    /// The session ended with an error
    pub const ERROR: i32 = FIRST_USER + 2;
}

/// Keys of the serialized result envelope
pub mod extras {
    pub const RESULT_BYTES: &str = "bytes";
    pub const RESULT_VALUE: &str = "value";
    pub const RESULT_TYPE: &str = "type";
    pub const RESULT_CONTENT: &str = "content";
    pub const RESULT_ERROR: &str = "error";
}
