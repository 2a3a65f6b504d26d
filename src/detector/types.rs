// SPDX-License-Identifier: GPL-3.0-only

//! Detection result types
//!
//! A [`Barcode`] is a plain value object: once the detector produced it,
//! nothing mutates it. It travels from the analysis worker to the session
//! loop and ends up in the result envelope.

use crate::content::QrContent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Barcode symbologies a scanner can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    /// Matches every symbology
    All,
    Code128,
    Code39,
    Code93,
    Codabar,
    DataMatrix,
    Ean13,
    Ean8,
    Itf,
    QrCode,
    UpcA,
    UpcE,
    Pdf417,
    Aztec,
}

impl BarcodeFormat {
    /// Parse the names used on the command line and in config files
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        Some(match normalized.as_str() {
            "all" => Self::All,
            "code128" => Self::Code128,
            "code39" => Self::Code39,
            "code93" => Self::Code93,
            "codabar" => Self::Codabar,
            "datamatrix" => Self::DataMatrix,
            "ean13" => Self::Ean13,
            "ean8" => Self::Ean8,
            "itf" => Self::Itf,
            "qr" | "qrcode" => Self::QrCode,
            "upca" => Self::UpcA,
            "upce" => Self::UpcE,
            "pdf417" => Self::Pdf417,
            "aztec" => Self::Aztec,
            _ => return None,
        })
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Code128 => "Code 128",
            Self::Code39 => "Code 39",
            Self::Code93 => "Code 93",
            Self::Codabar => "Codabar",
            Self::DataMatrix => "Data Matrix",
            Self::Ean13 => "EAN-13",
            Self::Ean8 => "EAN-8",
            Self::Itf => "ITF",
            Self::QrCode => "QR Code",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Pdf417 => "PDF417",
            Self::Aztec => "Aztec",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Set of accepted symbologies
///
/// An empty filter, or one containing [`BarcodeFormat::All`], accepts
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatFilter {
    formats: BTreeSet<BarcodeFormat>,
}

impl FormatFilter {
    pub fn new(formats: impl IntoIterator<Item = BarcodeFormat>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
        }
    }

    pub fn all() -> Self {
        Self::new([BarcodeFormat::All])
    }

    pub fn accepts_all(&self) -> bool {
        self.formats.is_empty() || self.formats.contains(&BarcodeFormat::All)
    }

    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        self.accepts_all() || self.formats.contains(&format)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BarcodeFormat> {
        self.formats.iter()
    }
}

/// Semantic category of a decoded value
///
/// The numeric codes are stable and go into the result envelope's `type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Unknown,
    ContactInfo,
    Email,
    Isbn,
    Phone,
    Product,
    Sms,
    Text,
    Url,
    Wifi,
    Geo,
    CalendarEvent,
    DriverLicense,
}

impl ValueType {
    pub fn code(&self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::ContactInfo => 1,
            Self::Email => 2,
            Self::Isbn => 3,
            Self::Phone => 4,
            Self::Product => 5,
            Self::Sms => 6,
            Self::Text => 7,
            Self::Url => 8,
            Self::Wifi => 9,
            Self::Geo => 10,
            Self::CalendarEvent => 11,
            Self::DriverLicense => 12,
        }
    }
}

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FrameRegion {
    /// Bounding box of a set of pixel points, normalized to the frame
    pub fn bounding(points: &[(i32, i32)], frame_width: u32, frame_height: u32) -> Option<Self> {
        if points.is_empty() || frame_width == 0 || frame_height == 0 {
            return None;
        }

        let min_x = points.iter().map(|p| p.0).min()?.max(0) as f32;
        let max_x = points.iter().map(|p| p.0).max()?.min(frame_width as i32) as f32;
        let min_y = points.iter().map(|p| p.1).min()?.max(0) as f32;
        let max_y = points.iter().map(|p| p.1).max()?.min(frame_height as i32) as f32;

        Some(Self {
            x: min_x / frame_width as f32,
            y: min_y / frame_height as f32,
            width: (max_x - min_x).max(0.0) / frame_width as f32,
            height: (max_y - min_y).max(0.0) / frame_height as f32,
        })
    }
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barcode {
    /// Payload bytes as decoded from the symbol
    pub raw_bytes: Vec<u8>,
    /// Payload as text, when it is valid UTF-8
    pub raw_value: Option<String>,
    pub format: BarcodeFormat,
    pub value_type: ValueType,
    /// Structured interpretation of `raw_value`
    pub content: QrContent,
    /// Location in the analyzed frame (normalized)
    pub bounds: Option<FrameRegion>,
}

impl Barcode {
    /// Build a barcode from its payload, classifying the content
    pub fn new(format: BarcodeFormat, raw_bytes: Vec<u8>, bounds: Option<FrameRegion>) -> Self {
        let raw_value = String::from_utf8(raw_bytes.clone()).ok();
        let content = QrContent::parse(raw_value.as_deref().unwrap_or_default());
        let value_type = if raw_value.is_some() {
            content.value_type()
        } else {
            ValueType::Unknown
        };

        Self {
            raw_bytes,
            raw_value,
            format,
            value_type,
            content,
            bounds,
        }
    }

    /// Whether the code carries a usable payload
    pub fn has_value(&self) -> bool {
        !self.raw_bytes.is_empty()
    }
}

/// Errors reported by a barcode detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Detector not ready yet (e.g. still loading); try later frames
    Unavailable(String),
    /// Detector is saturated and skipped the frame
    Busy,
    /// The frame could not be analyzed (bad dimensions or buffer)
    InvalidFrame(String),
    /// None of the requested formats is supported by this detector
    UnsupportedFormat(String),
    /// Detector crashed
    Internal(String),
}

impl DetectorError {
    pub fn is_resolvable(&self) -> bool {
        matches!(
            self,
            DetectorError::Unavailable(_) | DetectorError::Busy | DetectorError::InvalidFrame(_)
        )
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::Unavailable(msg) => write!(f, "Detector unavailable: {}", msg),
            DetectorError::Busy => write!(f, "Detector busy"),
            DetectorError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            DetectorError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            DetectorError::Internal(msg) => write!(f, "Detector failed: {}", msg),
        }
    }
}

impl std::error::Error for DetectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(BarcodeFormat::from_name("QR_CODE"), Some(BarcodeFormat::QrCode));
        assert_eq!(BarcodeFormat::from_name("qr"), Some(BarcodeFormat::QrCode));
        assert_eq!(BarcodeFormat::from_name("EAN-13"), Some(BarcodeFormat::Ean13));
        assert_eq!(BarcodeFormat::from_name("hologram"), None);
    }

    #[test]
    fn test_filter_accepts() {
        let qr_only = FormatFilter::new([BarcodeFormat::QrCode]);
        assert!(qr_only.accepts(BarcodeFormat::QrCode));
        assert!(!qr_only.accepts(BarcodeFormat::Ean8));

        assert!(FormatFilter::default().accepts(BarcodeFormat::Aztec));
        assert!(FormatFilter::all().accepts(BarcodeFormat::Aztec));
    }

    #[test]
    fn test_barcode_from_text_payload() {
        let barcode = Barcode::new(BarcodeFormat::QrCode, b"https://example.com".to_vec(), None);
        assert_eq!(barcode.raw_value.as_deref(), Some("https://example.com"));
        assert_eq!(barcode.value_type, ValueType::Url);
        assert_eq!(barcode.value_type.code(), 8);
    }

    #[test]
    fn test_barcode_from_binary_payload() {
        let barcode = Barcode::new(BarcodeFormat::QrCode, vec![0xff, 0xfe, 0x00], None);
        assert_eq!(barcode.raw_value, None);
        assert_eq!(barcode.value_type, ValueType::Unknown);
        assert!(barcode.has_value());
    }

    #[test]
    fn test_bounding_region() {
        let region = FrameRegion::bounding(&[(100, 50), (300, 50), (300, 150), (100, 150)], 1000, 500)
            .unwrap();
        assert!((region.x - 0.1).abs() < 0.001);
        assert!((region.y - 0.1).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
        assert!((region.height - 0.2).abs() < 0.001);
    }

    #[test]
    fn test_error_classification() {
        assert!(DetectorError::Unavailable("warming up".into()).is_resolvable());
        assert!(!DetectorError::Internal("panic".into()).is_resolvable());
        assert!(!DetectorError::UnsupportedFormat("ean13".into()).is_resolvable());
    }
}
