// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Opens a `/dev/video*` capture node with the `v4l` crate, negotiates the
//! supported resolution closest to the requested one, and streams frames
//! from a dedicated capture thread. Frames are converted to RGBA before they
//! leave the thread.

use super::format_converters::{self, CapturePixelFormat};
use super::types::*;
use super::{CameraBackend, select_resolution};
use crate::backends::torch::Torch;
use crate::constants::{CAPTURE_POLL_TIMEOUT, FRAME_CHANNEL_CAPACITY, V4L2_BUFFER_COUNT};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Enumerate capture-capable V4L2 devices
///
/// Metadata nodes (which share the card name with their capture node) are
/// skipped because they expose no convertible pixel format.
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let mut cameras = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(node.path()) else {
            debug!(path = %path, "Cannot open video node");
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            continue;
        }
        if pick_pixel_format(&dev).is_none() {
            debug!(path = %path, card = %caps.card, "No convertible pixel format, skipping");
            continue;
        }

        cameras.push(CameraDevice {
            location: CameraLocation::from_card_name(&caps.card),
            name: caps.card,
            path,
            driver: caps.driver,
            rotation: SensorRotation::None,
        });
    }

    cameras.sort_by(|a, b| a.path.cmp(&b.path));
    cameras
}

/// Choose the camera for a selector
///
/// Cameras that report a matching location win. Otherwise the first camera
/// is treated as the back camera and the second as the front camera.
pub fn choose_camera(cameras: &[CameraDevice], selector: CameraSelector) -> Option<&CameraDevice> {
    if let Some(found) = cameras
        .iter()
        .find(|c| c.location.is_some_and(|l| l.matches(selector)))
    {
        return Some(found);
    }

    let unlocated: Vec<&CameraDevice> = cameras
        .iter()
        .filter(|c| c.location.is_none() || c.location == Some(CameraLocation::External))
        .collect();
    match selector {
        CameraSelector::Back => unlocated.first().copied(),
        CameraSelector::Front => unlocated.get(1).copied(),
    }
}

fn pick_pixel_format(dev: &Device) -> Option<CapturePixelFormat> {
    let formats = dev.enum_formats().ok()?;
    CapturePixelFormat::PREFERENCE.into_iter().find(|wanted| {
        formats
            .iter()
            .any(|desc| CapturePixelFormat::from_fourcc(&desc.fourcc.repr) == Some(*wanted))
    })
}

fn supported_resolutions(dev: &Device, fourcc: FourCC, target: Resolution) -> Vec<Resolution> {
    let Ok(sizes) = dev.enum_framesizes(fourcc) else {
        return Vec::new();
    };

    let mut resolutions = Vec::new();
    for size in sizes {
        match size.size {
            v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                resolutions.push(Resolution::new(discrete.width, discrete.height));
            }
            v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                // Any size in range works; ask for the target clamped into it
                resolutions.push(Resolution::new(
                    target.width.clamp(step.min_width, step.max_width),
                    target.height.clamp(step.min_height, step.max_height),
                ));
                resolutions.push(Resolution::new(step.max_width, step.max_height));
            }
        }
    }
    resolutions
}

/// V4L2 camera backend
pub struct V4l2Backend {
    /// Open this node instead of choosing by selector
    device_path: Option<String>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    torch: Torch,
    torch_state: TorchState,
    device: Option<CameraDevice>,
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            device_path: None,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            torch: Torch::default(),
            torch_state: TorchState::Off,
            device: None,
        }
    }

    /// Always open the given capture node
    pub fn with_device_path(path: impl Into<String>) -> Self {
        let mut backend = Self::new();
        backend.device_path = Some(path.into());
        backend
    }

    /// The camera opened by the last successful `start`
    pub fn current_device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    fn resolve_device(&self, selector: CameraSelector) -> BackendResult<CameraDevice> {
        let cameras = enumerate_cameras();

        if let Some(path) = &self.device_path {
            return cameras
                .into_iter()
                .find(|c| &c.path == path)
                .ok_or_else(|| BackendError::DeviceNotFound(path.clone()));
        }

        if cameras.is_empty() {
            return Err(BackendError::DeviceNotFound("No cameras found".to_string()));
        }

        choose_camera(&cameras, selector)
            .cloned()
            .ok_or_else(|| BackendError::DeviceNotFound(format!("No {} camera", selector)))
    }
}

impl CameraBackend for V4l2Backend {
    fn start(
        &mut self,
        selector: CameraSelector,
        target: Resolution,
    ) -> BackendResult<FrameReceiver> {
        // Rebinding replaces any previous stream
        self.stop()?;

        let camera = self.resolve_device(selector)?;
        info!(device = %camera.name, path = %camera.path, %selector, "Opening V4L2 camera");

        let dev = Device::with_path(&camera.path).map_err(|e| {
            BackendError::InitializationFailed(format!("open {}: {}", camera.path, e))
        })?;

        let pixel_format = pick_pixel_format(&dev).ok_or_else(|| {
            BackendError::FormatNotSupported(format!("{} offers no usable format", camera.path))
        })?;
        let fourcc = FourCC::new(pixel_format.fourcc());

        let resolution = select_resolution(&supported_resolutions(&dev, fourcc, target), target)
            .unwrap_or(target);

        let applied = dev
            .set_format(&Format::new(resolution.width, resolution.height, fourcc))
            .map_err(|e| BackendError::InitializationFailed(format!("set format: {}", e)))?;

        if applied.fourcc != fourcc {
            return Err(BackendError::FormatNotSupported(format!(
                "driver replaced {:?} with {:?}",
                pixel_format, applied.fourcc
            )));
        }

        info!(
            width = applied.width,
            height = applied.height,
            stride = applied.stride,
            format = ?pixel_format,
            "V4L2 format negotiated"
        );

        let (sender, receiver) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let stream_format = StreamFormat {
            pixel_format,
            width: applied.width,
            height: applied.height,
            stride: applied.stride,
            rotation: camera.rotation,
        };

        let thread_handle = std::thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || {
                if let Err(e) = capture_loop(dev, stream_format, sender, running_clone) {
                    error!(error = %e, "V4L2 capture loop failed");
                }
            })
            .map_err(|e| BackendError::InitializationFailed(format!("spawn capture: {}", e)))?;

        self.torch = Torch::discover();
        self.running = running;
        self.thread_handle = Some(thread_handle);
        self.device = Some(camera);

        Ok(receiver)
    }

    fn stop(&mut self) -> BackendResult<()> {
        if self.torch_state.is_on() {
            if let Err(e) = self.torch.set(false) {
                warn!(error = %e, "Failed to switch torch off");
            }
            self.torch_state = TorchState::Off;
        }

        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            info!("Stopping V4L2 capture");
            match handle.join() {
                Ok(()) => debug!("Capture thread stopped"),
                Err(_) => warn!("Capture thread panicked"),
            }
        }

        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn has_flash_unit(&self) -> bool {
        self.torch.is_available()
    }

    fn enable_torch(&mut self, enabled: bool) -> BackendResult<TorchState> {
        if !self.is_running() {
            return Err(BackendError::NotStarted);
        }
        if !self.torch.is_available() {
            return Err(BackendError::NoFlashUnit);
        }
        self.torch.set(enabled)?;
        self.torch_state = enabled.into();
        Ok(self.torch_state)
    }

    fn name(&self) -> &'static str {
        "v4l2"
    }
}

impl Drop for V4l2Backend {
    fn drop(&mut self) {
        // Don't join in drop; the thread exits within one poll timeout
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Negotiated stream parameters handed to the capture thread
#[derive(Debug, Clone, Copy)]
struct StreamFormat {
    pixel_format: CapturePixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    rotation: SensorRotation,
}

/// Main capture loop running in a separate thread
fn capture_loop(
    dev: Device,
    format: StreamFormat,
    sender: FrameSender,
    running: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(|e| format!("Failed to create buffer stream: {}", e))?;
    // A stalled camera must not keep the thread from seeing `running`
    stream.set_timeout(CAPTURE_POLL_TIMEOUT);

    info!("V4L2 capture stream started");
    let mut sequence: u64 = 0;
    let mut dropped: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                if sender.is_closed() {
                    debug!("Frame receiver closed, ending capture");
                    break;
                }
                trace!("No frame within poll timeout");
                continue;
            }
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(format!("Capture failed: {}", e).into());
            }
        };

        let captured_at = Instant::now();
        let used = (meta.bytesused as usize).min(buf.len());
        let used = if used == 0 { buf.len() } else { used };

        let (rgba, width, height) = match format_converters::to_rgba(
            format.pixel_format,
            &buf[..used],
            format.width,
            format.height,
            format.stride,
        ) {
            Ok(converted) => converted,
            Err(e) => {
                // Corrupt MJPEG frames happen; skip them
                warn!(error = %e, sequence = meta.sequence, "Dropping unconvertible frame");
                continue;
            }
        };

        sequence += 1;
        let frame = CameraFrame {
            width,
            height,
            data: Arc::from(rgba),
            stride: width * 4,
            rotation: format.rotation,
            sequence,
            captured_at,
        };

        match sender.try_send(frame) {
            Ok(()) => trace!(sequence, "Frame delivered"),
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                trace!(sequence, dropped, "Consumer busy, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Frame receiver closed, ending capture");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    info!(frames = sequence, dropped, "V4L2 capture stream ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(name: &str, path: &str) -> CameraDevice {
        CameraDevice {
            location: CameraLocation::from_card_name(name),
            name: name.to_string(),
            path: path.to_string(),
            driver: "uvcvideo".to_string(),
            rotation: SensorRotation::None,
        }
    }

    #[test]
    fn test_choose_by_location() {
        let cameras = [
            camera("Front Camera", "/dev/video0"),
            camera("Rear Camera", "/dev/video2"),
        ];
        assert_eq!(
            choose_camera(&cameras, CameraSelector::Back).map(|c| c.path.as_str()),
            Some("/dev/video2")
        );
        assert_eq!(
            choose_camera(&cameras, CameraSelector::Front).map(|c| c.path.as_str()),
            Some("/dev/video0")
        );
    }

    #[test]
    fn test_choose_by_index_without_location() {
        let cameras = [camera("Integrated Camera", "/dev/video0")];
        assert!(choose_camera(&cameras, CameraSelector::Back).is_some());
        assert!(choose_camera(&cameras, CameraSelector::Front).is_none());
    }
}
