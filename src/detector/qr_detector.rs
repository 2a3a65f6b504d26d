// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Implements [`BarcodeDetector`] on top of the `rqrr` crate. Frames are
//! rotated upright, downscaled for speed, converted to luma and searched for
//! QR grids. Each decodable grid becomes a [`Barcode`].

use super::types::{Barcode, BarcodeFormat, DetectorError, FormatFilter, FrameRegion};
use super::{BarcodeDetector, DetectionOutcome};
use crate::backends::camera::{CameraFrame, SensorRotation};
use crate::constants::MAX_DETECTION_DIMENSION;
use futures::future::{BoxFuture, FutureExt};
use image::{DynamicImage, RgbaImage, imageops};
use tracing::{debug, trace, warn};

/// QR code detector
///
/// Only [`BarcodeFormat::QrCode`] is supported. Asking for other formats
/// alone is a configuration error; mixed sets simply only ever yield QR codes.
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
    formats: FormatFilter,
}

impl QrDetector {
    pub fn new(formats: FormatFilter) -> Result<Self, DetectorError> {
        Self::with_max_dimension(formats, MAX_DETECTION_DIMENSION)
    }

    pub fn with_max_dimension(
        formats: FormatFilter,
        max_dimension: u32,
    ) -> Result<Self, DetectorError> {
        if !formats.accepts(BarcodeFormat::QrCode) {
            let requested: Vec<String> = formats.iter().map(|f| f.to_string()).collect();
            return Err(DetectorError::UnsupportedFormat(format!(
                "QR detector cannot scan {}",
                requested.join(", ")
            )));
        }

        Ok(Self {
            max_dimension: max_dimension.max(64),
            formats,
        })
    }
}

impl BarcodeDetector for QrDetector {
    fn detect(&self, frame: CameraFrame) -> BoxFuture<'static, DetectionOutcome> {
        let max_dim = self.max_dimension;

        // Run detection in a blocking task to keep the runtime responsive
        async move {
            tokio::task::spawn_blocking(move || detect_sync(&frame, max_dim))
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "QR detection task panicked");
                    Err(DetectorError::Internal(e.to_string()))
                })
        }
        .boxed()
    }

    fn formats(&self) -> &FormatFilter {
        &self.formats
    }
}

/// Synchronous QR detection (runs in blocking task)
fn detect_sync(frame: &CameraFrame, max_dimension: u32) -> DetectionOutcome {
    let start = std::time::Instant::now();

    let upright = rotate_upright(frame_to_image(frame)?, frame.rotation);
    let (width, height) = upright.dimensions();

    let prepared_image = if width > max_dimension || height > max_dimension {
        let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
        let new_width = ((width as f32 / scale) as u32).max(1);
        let new_height = ((height as f32 / scale) as u32).max(1);
        imageops::resize(&upright, new_width, new_height, imageops::FilterType::Triangle)
    } else {
        upright
    };
    let (proc_width, proc_height) = prepared_image.dimensions();
    let gray = DynamicImage::ImageRgba8(prepared_image).to_luma8();

    trace!(
        sequence = frame.sequence,
        proc_width,
        proc_height,
        prepare_ms = start.elapsed().as_millis(),
        "Prepared luma image"
    );

    let mut prepared = rqrr::PreparedImage::prepare(gray);
    let grids = prepared.detect_grids();

    let mut detections = Vec::with_capacity(grids.len());
    for grid in grids {
        let mut payload = Vec::new();
        if let Err(e) = grid.decode_to(&mut payload) {
            debug!(error = %e, "Found QR grid but failed to decode it");
            continue;
        }

        let corners: Vec<(i32, i32)> = grid.bounds.iter().map(|p| (p.x, p.y)).collect();
        let bounds = FrameRegion::bounding(&corners, proc_width, proc_height);
        detections.push(Barcode::new(BarcodeFormat::QrCode, payload, bounds));
    }

    if !detections.is_empty() {
        debug!(
            count = detections.len(),
            sequence = frame.sequence,
            total_ms = start.elapsed().as_millis(),
            "QR detection found codes"
        );
    }

    Ok(detections)
}

/// Copy frame rows into a tightly packed RGBA image
fn frame_to_image(frame: &CameraFrame) -> Result<RgbaImage, DetectorError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let row_len = width * 4;

    if width == 0 || height == 0 {
        return Err(DetectorError::InvalidFrame(format!(
            "empty {}x{} frame",
            width, height
        )));
    }
    if stride < row_len || frame.data.len() < stride * (height - 1) + row_len {
        return Err(DetectorError::InvalidFrame(format!(
            "{} bytes do not hold {}x{} RGBA with stride {}",
            frame.data.len(),
            width,
            height,
            stride
        )));
    }

    let mut pixels = Vec::with_capacity(row_len * height);
    for y in 0..height {
        let row_start = y * stride;
        pixels.extend_from_slice(&frame.data[row_start..row_start + row_len]);
    }

    RgbaImage::from_raw(frame.width, frame.height, pixels)
        .ok_or_else(|| DetectorError::InvalidFrame("pixel buffer size mismatch".to_string()))
}

/// Undo the sensor rotation so the image is upright
fn rotate_upright(img: RgbaImage, rotation: SensorRotation) -> RgbaImage {
    match rotation {
        SensorRotation::None => img,
        SensorRotation::Rotate90 => imageops::rotate270(&img),
        SensorRotation::Rotate180 => imageops::rotate180(&img),
        SensorRotation::Rotate270 => imageops::rotate90(&img),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn blank_frame(width: u32, height: u32) -> CameraFrame {
        CameraFrame::from_rgba(width, height, vec![255; (width * height * 4) as usize], 1)
    }

    #[test]
    fn test_rejects_non_qr_formats() {
        let result = QrDetector::new(FormatFilter::new([BarcodeFormat::Ean13]));
        assert!(matches!(result, Err(DetectorError::UnsupportedFormat(_))));

        assert!(QrDetector::new(FormatFilter::new([BarcodeFormat::Ean13, BarcodeFormat::QrCode])).is_ok());
        assert!(QrDetector::new(FormatFilter::all()).is_ok());
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let detections = detect_sync(&blank_frame(320, 240), 640).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_short_buffer_is_invalid_frame() {
        let mut frame = blank_frame(4, 4);
        frame.data = Arc::from(vec![0u8; 10]);
        assert!(matches!(
            detect_sync(&frame, 640),
            Err(DetectorError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_frame_to_image_removes_stride() {
        // 2x2 RGBA with 2 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, //
            0, 0, 255, 255, 255, 255, 255, 255, 0, 0,
        ];
        let mut frame = CameraFrame::from_rgba(2, 2, Vec::new(), 1);
        frame.data = Arc::from(data);
        frame.stride = 10;

        let img = frame_to_image(&frame).unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = RgbaImage::new(4, 2);
        assert_eq!(rotate_upright(img.clone(), SensorRotation::Rotate90).dimensions(), (2, 4));
        assert_eq!(rotate_upright(img, SensorRotation::Rotate180).dimensions(), (4, 2));
    }

    #[tokio::test]
    async fn test_async_detect_on_blank_frame() {
        let detector = QrDetector::new(FormatFilter::all()).unwrap();
        let outcome = detector.detect(blank_frame(1280, 720)).await;
        assert_eq!(outcome, Ok(Vec::new()));
    }
}
