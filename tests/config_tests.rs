// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use code_scanner::{BarcodeFormat, ScanError, ScannerConfig};
use std::collections::BTreeSet;

#[test]
fn test_config_default() {
    let config = ScannerConfig::default();

    assert!(config.haptic_feedback, "Haptics should be enabled by default");
    assert!(!config.use_front_camera, "Back camera should be the default");
    assert_eq!(config.horizontal_frame_ratio, 1.0);
    assert_eq!(config.formats, BTreeSet::from([BarcodeFormat::QrCode]));
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScannerConfig::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, ScannerConfig::default());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = ScannerConfig {
        formats: BTreeSet::from([BarcodeFormat::QrCode]),
        overlay_text: Some("Point at the code".into()),
        horizontal_frame_ratio: 1.5,
        show_torch_toggle: true,
        ..Default::default()
    };
    config.save(&path).unwrap();

    assert_eq!(ScannerConfig::load(&path).unwrap(), config);
}

#[test]
fn test_load_validates_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"formats":[],"horizontal_frame_ratio":0.2}"#).unwrap();

    let config = ScannerConfig::load(&path).unwrap();
    assert_eq!(config.horizontal_frame_ratio, 1.0);
    assert!(config.formats.contains(&BarcodeFormat::All));
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = ScannerConfig::load(&path).unwrap_err();
    assert!(matches!(err, ScanError::Config(_)));
    assert!(!err.is_resolvable());
}
