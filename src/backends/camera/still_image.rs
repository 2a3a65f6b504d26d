// SPDX-License-Identifier: GPL-3.0-only

//! Still image frame source
//!
//! Replays decoded images as if they came from a camera. Each image is sent
//! a few times, paced like a live stream, so a frame that arrives while the
//! analyzer is busy gets another chance. When every image has been played
//! the channel closes and the session sees the stream end.

use super::CameraBackend;
use super::types::*;
use crate::constants::{FRAME_CHANNEL_CAPACITY, STILL_FRAME_INTERVAL};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Camera backend backed by in-memory images
pub struct StillImageBackend {
    frames: Vec<CameraFrame>,
    repeats: usize,
    interval: Duration,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl StillImageBackend {
    /// Replay already decoded frames
    pub fn from_frames(frames: Vec<CameraFrame>) -> Self {
        Self {
            frames,
            repeats: 3,
            interval: STILL_FRAME_INTERVAL,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Decode image files (any format the `image` crate reads)
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> BackendResult<Self> {
        let mut frames = Vec::with_capacity(paths.len());

        for (index, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            frames.push(load_image_as_frame(path, index as u64 + 1)?);
        }

        info!(count = frames.len(), "Loaded still images");
        Ok(Self::from_frames(frames))
    }

    /// How many times each image is sent
    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path, sequence: u64) -> BackendResult<CameraFrame> {
    let img = image::open(path).map_err(|e| {
        BackendError::InitializationFailed(format!("{}: {}", path.display(), e))
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(path = %path.display(), width, height, "Decoded still image");
    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw(), sequence))
}

impl CameraBackend for StillImageBackend {
    fn start(
        &mut self,
        _selector: CameraSelector,
        _target: Resolution,
    ) -> BackendResult<FrameReceiver> {
        self.stop()?;

        if self.frames.is_empty() {
            return Err(BackendError::DeviceNotFound("No images to scan".to_string()));
        }

        let (sender, receiver) = tokio::sync::mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let frames = self.frames.clone();
        let repeats = self.repeats;
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("still-image-source".into())
            .spawn(move || replay_loop(frames, repeats, interval, sender, running_clone))
            .map_err(|e| BackendError::InitializationFailed(format!("spawn replay: {}", e)))?;

        self.running = running;
        self.thread_handle = Some(handle);
        Ok(receiver)
    }

    fn stop(&mut self) -> BackendResult<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!("Still image thread panicked");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn has_flash_unit(&self) -> bool {
        false
    }

    fn enable_torch(&mut self, _enabled: bool) -> BackendResult<TorchState> {
        Err(BackendError::NoFlashUnit)
    }

    fn name(&self) -> &'static str {
        "still-image"
    }
}

impl Drop for StillImageBackend {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn replay_loop(
    frames: Vec<CameraFrame>,
    repeats: usize,
    interval: Duration,
    sender: FrameSender,
    running: Arc<AtomicBool>,
) {
    let mut sequence = 0u64;

    'outer: for frame in &frames {
        for _ in 0..repeats {
            if !running.load(Ordering::SeqCst) {
                break 'outer;
            }

            sequence += 1;
            let mut next = frame.clone();
            next.sequence = sequence;
            next.captured_at = Instant::now();

            // Blocking send: a file source should not lose frames to a full queue
            if sender.blocking_send(next).is_err() {
                debug!("Frame receiver closed, ending replay");
                break 'outer;
            }
            std::thread::sleep(interval);
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!(frames = sequence, "Still image replay finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_each_frame_repeatedly_then_closes() {
        let frames = vec![
            CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], 1),
            CameraFrame::from_rgba(1, 1, vec![255, 255, 255, 255], 2),
        ];
        let mut backend = StillImageBackend::from_frames(frames)
            .with_repeats(2)
            .with_interval(Duration::ZERO);

        let mut receiver = backend
            .start(CameraSelector::Back, Resolution::new(1280, 720))
            .unwrap();

        let mut received = Vec::new();
        while let Some(frame) = receiver.blocking_recv() {
            received.push((frame.sequence, frame.data[0]));
        }
        assert_eq!(received, vec![(1, 0), (2, 0), (3, 255), (4, 255)]);

        backend.stop().unwrap();
        assert!(!backend.is_running());
    }

    #[test]
    fn test_empty_source_fails_to_start() {
        let mut backend = StillImageBackend::from_frames(Vec::new());
        assert!(backend
            .start(CameraSelector::Back, Resolution::new(640, 480))
            .is_err());
    }

    #[test]
    fn test_torch_unavailable() {
        let mut backend = StillImageBackend::from_frames(Vec::new());
        assert!(!backend.has_flash_unit());
        assert_eq!(backend.enable_torch(true), Err(BackendError::NoFlashUnit));
    }
}
