// SPDX-License-Identifier: GPL-3.0-only

//! Torch control via Linux sysfs LEDs
//!
//! Flash LEDs show up as `/sys/class/leds/*:flash` (or `*:torch`). Writing
//! the `brightness` file drives them in torch mode, which is what a scanner
//! needs to light up a code in a dark room.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";

/// One writable flash LED
#[derive(Debug, Clone)]
pub struct TorchLed {
    path: PathBuf,
    max_brightness: u32,
    name: String,
}

impl TorchLed {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn set(&self, on: bool) -> io::Result<()> {
        let value = if on { self.max_brightness } else { 0 };
        std::fs::write(self.path.join("brightness"), value.to_string())
    }
}

/// All controllable flash LEDs of the machine
#[derive(Debug, Clone, Default)]
pub struct Torch {
    leds: Vec<TorchLed>,
}

impl Torch {
    /// Discover LEDs below `/sys/class/leds`
    pub fn discover() -> Self {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// Discover LEDs below an arbitrary sysfs-like directory
    pub fn discover_in(leds_dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "No LED class directory, torch unavailable");
            return Self::default();
        };

        let mut leds = Vec::new();

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !(name.ends_with(":flash") || name.ends_with(":torch")) {
                continue;
            }

            let led_path = entry.path();
            let max_path = led_path.join("max_brightness");
            let max_brightness = match std::fs::read_to_string(&max_path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
            {
                Some(v) if v > 0 => v,
                _ => {
                    warn!(path = %max_path.display(), "Invalid or unreadable max_brightness");
                    continue;
                }
            };

            let brightness_path = led_path.join("brightness");
            if let Err(e) = std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                warn!(
                    path = %brightness_path.display(),
                    error = %e,
                    "Flash LED found but not writable"
                );
                continue;
            }

            info!(name, max_brightness, "Discovered torch LED");
            leds.push(TorchLed {
                path: led_path,
                max_brightness,
                name: name.to_string(),
            });
        }

        leds.sort_by(|a, b| a.name.cmp(&b.name));
        Self { leds }
    }

    pub fn is_available(&self) -> bool {
        !self.leds.is_empty()
    }

    pub fn leds(&self) -> &[TorchLed] {
        &self.leds
    }

    /// Switch every LED; fails if none could be switched
    pub fn set(&self, on: bool) -> io::Result<()> {
        let mut last_error = None;
        let mut switched = 0;

        for led in &self.leds {
            match led.set(on) {
                Ok(()) => switched += 1,
                Err(e) => {
                    warn!(led = %led.name, error = %e, on, "Failed to switch torch LED");
                    last_error = Some(e);
                }
            }
        }

        match (switched, last_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(io::Error::new(io::ErrorKind::NotFound, "no torch LEDs")),
            _ => Ok(()),
        }
    }
}
