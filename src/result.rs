// SPDX-License-Identifier: GPL-3.0-only

//! Terminal outcome of a scanner session

use crate::constants::{extras, result_codes};
use crate::detector::Barcode;
use crate::errors::ScanError;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// How a scanner session ended
///
/// Exactly one of these is delivered per session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    Success(Barcode),
    UserCanceled,
    MissingPermission,
    Error(ScanError),
}

impl ScanResult {
    /// Host result code
    pub fn result_code(&self) -> i32 {
        match self {
            ScanResult::Success(_) => result_codes::OK,
            ScanResult::UserCanceled => result_codes::CANCELED,
            ScanResult::MissingPermission => result_codes::MISSING_PERMISSION,
            ScanResult::Error(_) => result_codes::ERROR,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScanResult::Success(_))
    }

    pub fn barcode(&self) -> Option<&Barcode> {
        match self {
            ScanResult::Success(barcode) => Some(barcode),
            _ => None,
        }
    }

    /// Serializable record handed back to the host
    ///
    /// Success carries the payload bytes, the text value (when the payload
    /// is text), the value type code and the parsed content. Errors carry a
    /// description. Other outcomes only have the result code.
    pub fn envelope(&self) -> Value {
        let mut map = Map::new();
        map.insert("code".to_string(), Value::from(self.result_code()));

        match self {
            ScanResult::Success(barcode) => {
                map.insert(
                    extras::RESULT_BYTES.to_string(),
                    Value::from(barcode.raw_bytes.clone()),
                );
                if let Some(value) = &barcode.raw_value {
                    map.insert(extras::RESULT_VALUE.to_string(), Value::from(value.as_str()));
                }
                map.insert(
                    extras::RESULT_TYPE.to_string(),
                    Value::from(barcode.value_type.code()),
                );
                if barcode.raw_value.is_some() {
                    match serde_json::to_value(&barcode.content) {
                        Ok(content) => {
                            map.insert(extras::RESULT_CONTENT.to_string(), content);
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize barcode content"),
                    }
                }
            }
            ScanResult::Error(error) => {
                map.insert(
                    extras::RESULT_ERROR.to_string(),
                    Value::from(error.to_string()),
                );
            }
            ScanResult::UserCanceled | ScanResult::MissingPermission => {}
        }

        Value::Object(map)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanResult::Success(barcode) => match &barcode.raw_value {
                Some(value) => write!(f, "{}: {}", barcode.format, value),
                None => write!(f, "{}: {} bytes", barcode.format, barcode.raw_bytes.len()),
            },
            ScanResult::UserCanceled => write!(f, "Canceled"),
            ScanResult::MissingPermission => write!(f, "Camera permission missing"),
            ScanResult::Error(e) => write!(f, "{}", e),
        }
    }
}
