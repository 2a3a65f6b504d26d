// SPDX-License-Identifier: GPL-3.0-only

//! Camera access permission
//!
//! A denied permission is a terminal outcome of its own, not an error: the
//! session ends with [`crate::ScanResult::MissingPermission`].

use futures::future::{BoxFuture, FutureExt};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl From<bool> for PermissionStatus {
    fn from(granted: bool) -> Self {
        if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

/// Host permission system granting or denying camera access
pub trait PermissionProvider: Send + Sync {
    /// Current status without prompting
    fn check(&self) -> PermissionStatus;

    /// Ask for access; resolves once the host has decided
    fn request(&self) -> BoxFuture<'static, PermissionStatus>;
}

/// Permission derived from access rights on the video device nodes
///
/// Linux has no interactive camera prompt; access is granted when the user
/// can open at least one capture node read/write (typically through the
/// `video` group).
#[derive(Debug, Clone)]
pub struct DevicePermission {
    dev_dir: PathBuf,
}

impl Default for DevicePermission {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
        }
    }
}

impl DevicePermission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check nodes below another directory instead of `/dev`
    pub fn with_dev_dir(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }

    fn video_nodes(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.dev_dir) else {
            return Vec::new();
        };

        let mut nodes: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("video"))
            .map(|e| e.path())
            .collect();
        nodes.sort();
        nodes
    }
}

fn can_read_write(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

impl PermissionProvider for DevicePermission {
    fn check(&self) -> PermissionStatus {
        let nodes = self.video_nodes();
        let granted = nodes.iter().any(|node| can_read_write(node));
        debug!(nodes = nodes.len(), granted, "Checked video device access");
        granted.into()
    }

    fn request(&self) -> BoxFuture<'static, PermissionStatus> {
        let this = self.clone();
        async move {
            let status = tokio::task::spawn_blocking(move || this.check())
                .await
                .unwrap_or(PermissionStatus::Denied);
            if !status.is_granted() {
                info!("Camera access denied; add the user to the 'video' group");
            }
            status
        }
        .boxed()
    }
}

/// Always grants access, for sources that need no device
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantedPermission;

impl PermissionProvider for GrantedPermission {
    fn check(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request(&self) -> BoxFuture<'static, PermissionStatus> {
        futures::future::ready(PermissionStatus::Granted).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessible_node_grants() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video0"), b"").unwrap();
        std::fs::write(dir.path().join("null"), b"").unwrap();

        let permission = DevicePermission::with_dev_dir(dir.path());
        assert_eq!(permission.check(), PermissionStatus::Granted);
    }

    #[test]
    fn test_no_nodes_denies() {
        let dir = tempfile::tempdir().unwrap();
        let permission = DevicePermission::with_dev_dir(dir.path());
        assert_eq!(permission.check(), PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_request_rechecks() {
        let dir = tempfile::tempdir().unwrap();
        let permission = DevicePermission::with_dev_dir(dir.path());
        assert_eq!(permission.request().await, PermissionStatus::Denied);

        std::fs::write(dir.path().join("video2"), b"").unwrap();
        assert_eq!(permission.request().await, PermissionStatus::Granted);
    }
}
