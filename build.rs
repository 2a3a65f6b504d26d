// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packagers can pin the version string without a git checkout
    let version = match std::env::var("CODE_SCANNER_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version derived from `git describe`, falling back to the crate version
fn describe_version() -> String {
    let package_version = env!("CARGO_PKG_VERSION").to_string();

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let described = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return package_version,
    };

    let described = described.strip_prefix('v').unwrap_or(&described);

    // "0.3.0-4-gabcdef1" -> "0.3.0+abcdef1"
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [hash, _commits, base] => {
            format!("{}+{}", base, hash.strip_prefix('g').unwrap_or(hash))
        }
        [single] if !single.contains('.') => format!("{}+{}", package_version, single),
        _ => described.to_string(),
    }
}
