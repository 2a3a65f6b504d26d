// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion for captured frames
//!
//! The detector works on RGBA. Webcams mostly deliver packed YUV 4:2:2 or
//! MJPEG, so every supported capture format is expanded to RGBA here.

use super::types::{BackendError, BackendResult};

/// Capture formats the V4L2 backend can convert, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePixelFormat {
    /// Packed YUV 4:2:2, Y0 U Y1 V
    Yuyv,
    /// Packed YUV 4:2:2, U Y0 V Y1
    Uyvy,
    /// 24-bit RGB
    Rgb24,
    /// 8-bit luma only
    Grey,
    /// Motion JPEG, one JPEG image per frame
    Mjpeg,
}

impl CapturePixelFormat {
    pub const PREFERENCE: [CapturePixelFormat; 5] = [
        CapturePixelFormat::Yuyv,
        CapturePixelFormat::Uyvy,
        CapturePixelFormat::Rgb24,
        CapturePixelFormat::Grey,
        CapturePixelFormat::Mjpeg,
    ];

    /// Match a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::Yuyv),
            b"UYVY" => Some(Self::Uyvy),
            b"RGB3" => Some(Self::Rgb24),
            b"GREY" => Some(Self::Grey),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            Self::Yuyv => b"YUYV",
            Self::Uyvy => b"UYVY",
            Self::Rgb24 => b"RGB3",
            Self::Grey => b"GREY",
            Self::Mjpeg => b"MJPG",
        }
    }

    /// Bytes per pixel of uncompressed formats
    fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Yuyv | Self::Uyvy => Some(2),
            Self::Rgb24 => Some(3),
            Self::Grey => Some(1),
            Self::Mjpeg => None,
        }
    }
}

/// Convert a captured buffer to tightly packed RGBA
///
/// `stride` is the driver-reported bytes per line; `0` means tightly packed.
/// Returns the RGBA data and its dimensions (MJPEG frames carry their own).
pub fn to_rgba(
    format: CapturePixelFormat,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
) -> BackendResult<(Vec<u8>, u32, u32)> {
    if format == CapturePixelFormat::Mjpeg {
        return mjpeg_to_rgba(data);
    }

    let packed = unpad_rows(format, data, width, height, stride)?;
    let rgba = match format {
        CapturePixelFormat::Yuyv => yuv422_to_rgba(&packed, width, height, [0, 1, 2, 3]),
        CapturePixelFormat::Uyvy => yuv422_to_rgba(&packed, width, height, [1, 0, 3, 2]),
        CapturePixelFormat::Rgb24 => rgb_to_rgba(&packed),
        CapturePixelFormat::Grey => grey_to_rgba(&packed),
        CapturePixelFormat::Mjpeg => unreachable!("handled above"),
    };
    Ok((rgba, width, height))
}

/// Drop per-row padding so rows are contiguous
fn unpad_rows(
    format: CapturePixelFormat,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
) -> BackendResult<Vec<u8>> {
    let bpp = format.bytes_per_pixel().unwrap_or(1);
    let row_len = width as usize * bpp;
    let stride = if stride == 0 { row_len } else { stride as usize };

    if width == 0 || height == 0 {
        return Err(BackendError::FormatNotSupported(format!(
            "empty {}x{} frame",
            width, height
        )));
    }

    if stride < row_len || data.len() < stride * (height as usize - 1) + row_len {
        return Err(BackendError::FormatNotSupported(format!(
            "buffer of {} bytes too small for {}x{} {:?} (stride {})",
            data.len(),
            width,
            height,
            format,
            stride
        )));
    }

    if stride == row_len {
        return Ok(data[..row_len * height as usize].to_vec());
    }

    let mut packed = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        packed.extend_from_slice(&row[..row_len]);
    }
    Ok(packed)
}

/// Convert packed YUV 4:2:2 to RGBA (BT.601)
///
/// `order` gives the byte offsets of Y0, U, Y1 and V inside each 4-byte
/// group, which is the only difference between YUYV and UYVY.
pub fn yuv422_to_rgba(data: &[u8], width: u32, height: u32, order: [usize; 4]) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);
    let [y0_at, u_at, y1_at, v_at] = order;

    for chunk in data.chunks_exact(4) {
        let u = chunk[u_at] as f32 - 128.0;
        let v = chunk[v_at] as f32 - 128.0;

        for y in [chunk[y0_at] as f32, chunk[y1_at] as f32] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            rgba.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgba.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
            rgba.push(255);
        }
    }

    rgba
}

/// Convert RGB to RGBA by adding alpha=255
pub fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for chunk in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
    }
    rgba
}

/// Expand 8-bit luma to opaque grey RGBA
pub fn grey_to_rgba(grey: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(grey.len() * 4);
    for &l in grey {
        rgba.extend_from_slice(&[l, l, l, 255]);
    }
    rgba
}

/// Decode one MJPEG frame
pub fn mjpeg_to_rgba(data: &[u8]) -> BackendResult<(Vec<u8>, u32, u32)> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| BackendError::FormatNotSupported(format!("MJPEG decode failed: {}", e)))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok((rgba.into_raw(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_white() {
        // Y=255, U=V=128 is white
        let yuyv = vec![255u8, 128, 255, 128];
        let (rgba, w, h) = to_rgba(CapturePixelFormat::Yuyv, &yuyv, 2, 1, 0).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(rgba.len(), 8);
        assert!(rgba[0] > 250 && rgba[1] > 250 && rgba[2] > 250);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn test_uyvy_black() {
        let uyvy = vec![128u8, 0, 128, 0];
        let (rgba, _, _) = to_rgba(CapturePixelFormat::Uyvy, &uyvy, 2, 1, 0).unwrap();
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_stride_padding_is_removed() {
        // 2x2 grey with 2 bytes of padding per row
        let grey = vec![10u8, 20, 0, 0, 30, 40, 0, 0];
        let (rgba, _, _) = to_rgba(CapturePixelFormat::Grey, &grey, 2, 2, 4).unwrap();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[8..12], &[30, 30, 30, 255]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let result = to_rgba(CapturePixelFormat::Rgb24, &[0u8; 5], 2, 1, 0);
        assert!(matches!(result, Err(BackendError::FormatNotSupported(_))));
    }

    #[test]
    fn test_rgb_to_rgba() {
        let rgba = rgb_to_rgba(&[255, 128, 64, 0, 0, 0]);
        assert_eq!(rgba, vec![255, 128, 64, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_fourcc_roundtrip() {
        for format in CapturePixelFormat::PREFERENCE {
            assert_eq!(CapturePixelFormat::from_fourcc(format.fourcc()), Some(format));
        }
        assert_eq!(CapturePixelFormat::from_fourcc(b"NV12"), None);
    }
}
