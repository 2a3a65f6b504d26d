// SPDX-License-Identifier: GPL-3.0-only

//! Host collaborators: camera pipeline, torch and camera permission

pub mod camera;
pub mod permission;
pub mod torch;

pub use permission::{DevicePermission, GrantedPermission, PermissionProvider, PermissionStatus};
pub use torch::Torch;
