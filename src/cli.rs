// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning with a live camera
//! - Scanning image files

use chrono::Local;
use code_scanner::backends::camera::still_image::load_image_as_frame;
use code_scanner::backends::camera::{
    BackendError, CameraFrame, StillImageBackend, V4l2Backend, enumerate_cameras,
};
use code_scanner::backends::permission::DevicePermission;
use code_scanner::detector::{Barcode, BarcodeDetector, BarcodeFormat, QrDetector};
use code_scanner::session::{SessionEvent, SuccessActionProvider, TerminalBell};
use code_scanner::{ScanError, ScanResult, ScannerAction, ScannerConfig, ScannerSession};
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// How results are printed
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print(&self, result: &ScanResult) {
        if self.json {
            match serde_json::to_string_pretty(&result.envelope()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize result: {}", e),
            }
            return;
        }

        match result {
            ScanResult::Success(barcode) => print_barcode(barcode),
            other => eprintln!("{}", other),
        }
    }
}

fn print_barcode(barcode: &Barcode) {
    match &barcode.raw_value {
        Some(value) => println!("{}", value),
        None => println!("<{} binary bytes>", barcode.raw_bytes.len()),
    }
    eprintln!("  {} / {}", barcode.format, barcode.content.summary());
}

/// Process exit status for a result
fn exit_status(result: &ScanResult) -> i32 {
    match result {
        ScanResult::Success(_) => 0,
        ScanResult::UserCanceled => 1,
        ScanResult::MissingPermission => 2,
        ScanResult::Error(_) => 3,
    }
}

/// Load the config file and apply `--formats`
pub fn load_config(
    path: Option<&Path>,
    formats: &[String],
) -> Result<ScannerConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ScannerConfig::load(path)?,
        None => ScannerConfig::load_default()?,
    };

    if !formats.is_empty() {
        let mut parsed = BTreeSet::new();
        for name in formats {
            let format = BarcodeFormat::from_name(name)
                .ok_or_else(|| format!("Unknown barcode format: {}", name))?;
            parsed.insert(format);
        }
        config.formats = parsed;
    }

    Ok(config.validate())
}

/// List all available cameras
pub fn list_cameras() {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return;
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Device: {} ({})", camera.path, camera.driver);
        if let Some(location) = camera.location {
            println!("      Location: {:?}", location);
        }
        if camera.rotation.degrees() != 0 {
            println!("      Rotation: {}°", camera.rotation.degrees());
        }
        println!();
    }
}

/// Prints each new code and keeps scanning
struct PrintAndContinue {
    output: Output,
    last: Mutex<Option<Vec<u8>>>,
}

impl SuccessActionProvider for PrintAndContinue {
    fn on_success(&self, barcode: &Barcode) -> BoxFuture<'static, ScannerAction> {
        let repeated = match self.last.lock() {
            Ok(mut last) => {
                let repeated = last.as_deref() == Some(barcode.raw_bytes.as_slice());
                *last = Some(barcode.raw_bytes.clone());
                repeated
            }
            Err(_) => false,
        };

        if !repeated {
            if !self.output.json {
                eprint!("[{}] ", Local::now().format("%H:%M:%S"));
            }
            self.output.print(&ScanResult::Success(barcode.clone()));
        }

        futures::future::ready(ScannerAction::ContinueScanning).boxed()
    }
}

/// Scan with the default (or front) camera until a code is found or Ctrl+C
pub fn scan_camera(
    config: ScannerConfig,
    torch: bool,
    keep_going: bool,
    output: Output,
) -> Result<i32, Box<dyn std::error::Error>> {
    let detector = QrDetector::new(config.format_filter())?;

    let mut session = ScannerSession::new(config, Box::new(V4l2Backend::new()), Arc::new(detector))
        .with_permission(Arc::new(DevicePermission::new()))
        .with_haptics(Arc::new(TerminalBell));
    if keep_going {
        session = session.with_success_action(Arc::new(PrintAndContinue {
            output,
            last: Mutex::new(None),
        }));
    }

    let handle = session.handle();
    let ctrlc_handle = handle.clone();
    ctrlc::set_handler(move || {
        ctrlc_handle.close();
    })?;
    if torch {
        handle.set_torch(true);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async move {
        let mut events = session.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::ShowError(message) => {
                        eprintln!("Error: {}", message);
                        handle.dismiss_error();
                    }
                    other => debug!(?other, "Session event"),
                }
            }
        });

        eprintln!("Scanning, press Ctrl+C to stop");
        session.run().await
    });

    // Continuous mode already printed every code; Ctrl+C is its normal end
    if keep_going && matches!(result, ScanResult::UserCanceled) {
        return Ok(0);
    }
    output.print(&result);
    Ok(exit_status(&result))
}

/// Scan image files, stopping at the first code
pub fn scan_images(
    config: ScannerConfig,
    paths: &[PathBuf],
    output: Output,
) -> Result<i32, Box<dyn std::error::Error>> {
    let detector = QrDetector::new(config.format_filter())?;
    let frames = paths
        .iter()
        .enumerate()
        .map(|(index, path)| load_image_as_frame(path, index as u64 + 1))
        .collect::<Result<Vec<_>, _>>()?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(scan_each_frame(&config, Arc::new(detector), frames));

    if let ScanResult::Error(e) = &result {
        warn!(error = %e, "No code found in images");
    }
    output.print(&result);
    Ok(exit_status(&result))
}

/// One session per image, so a slow detector never skips one
///
/// Stops at the first image with a code or at a fatal error.
async fn scan_each_frame(
    config: &ScannerConfig,
    detector: Arc<dyn BarcodeDetector>,
    frames: Vec<CameraFrame>,
) -> ScanResult {
    let mut result = ScanResult::Error(ScanError::Camera(BackendError::StreamEnded));

    for frame in frames {
        let sequence = frame.sequence;
        let backend = StillImageBackend::from_frames(vec![frame]).with_repeats(1);
        result = ScannerSession::new(config.clone(), Box::new(backend), Arc::clone(&detector))
            .run()
            .await;

        match &result {
            ScanResult::Error(ScanError::Camera(BackendError::StreamEnded)) => {
                debug!(image = sequence, "No code in image");
            }
            ScanResult::Error(e) if e.is_resolvable() => {
                debug!(image = sequence, error = %e, "Image not scanned");
            }
            _ => break,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_scanner::detector::{DetectionOutcome, FormatFilter};
    use std::time::Duration;

    /// Finds a code only in bright frames, slower than the replay pace
    struct SlowBrightDetector {
        formats: FormatFilter,
        calls: Mutex<Vec<u8>>,
    }

    impl BarcodeDetector for SlowBrightDetector {
        fn detect(&self, frame: CameraFrame) -> BoxFuture<'static, DetectionOutcome> {
            let brightness = frame.data[0];
            self.calls.lock().unwrap().push(brightness);
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                if brightness == 255 {
                    Ok(vec![Barcode::new(BarcodeFormat::QrCode, b"found".to_vec(), None)])
                } else {
                    Ok(Vec::new())
                }
            }
            .boxed()
        }

        fn formats(&self) -> &FormatFilter {
            &self.formats
        }
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&ScanResult::UserCanceled), 1);
        assert_eq!(exit_status(&ScanResult::MissingPermission), 2);
        assert_eq!(
            exit_status(&ScanResult::Error(ScanError::Config("x".into()))),
            3
        );
    }

    #[test]
    fn test_load_config_with_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(Some(&path), &["qr".to_string(), "ean13".to_string()]).unwrap();
        assert_eq!(
            config.formats,
            BTreeSet::from([BarcodeFormat::QrCode, BarcodeFormat::Ean13])
        );

        assert!(load_config(Some(&path), &["nope".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_every_image_is_scanned_with_slow_detector() {
        let detector = Arc::new(SlowBrightDetector {
            formats: FormatFilter::all(),
            calls: Mutex::new(Vec::new()),
        });
        let frames = vec![
            CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], 1),
            CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], 2),
            CameraFrame::from_rgba(1, 1, vec![255, 255, 255, 255], 3),
        ];

        let result = scan_each_frame(&ScannerConfig::default(), detector.clone(), frames).await;

        assert_eq!(result.barcode().and_then(|b| b.raw_value.as_deref()), Some("found"));
        assert_eq!(*detector.calls.lock().unwrap(), vec![0, 0, 255]);
    }

    #[tokio::test]
    async fn test_images_without_code_end_with_stream_end() {
        let detector = Arc::new(SlowBrightDetector {
            formats: FormatFilter::all(),
            calls: Mutex::new(Vec::new()),
        });
        let frames = vec![CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], 1)];

        let result = scan_each_frame(&ScannerConfig::default(), detector, frames).await;

        assert_eq!(result, ScanResult::Error(ScanError::Camera(BackendError::StreamEnded)));
    }
}
