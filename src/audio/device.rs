//! Output device resolution.
//!
//! Maps a human-supplied specifier (absent, an index, or a name fragment) to a
//! device handle. Resolution never fails: anything unresolvable falls back to
//! the platform default.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::error::SessionResult;

/// An enumerated audio device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Position in platform enumeration order
    pub index: usize,
    pub name: String,
    /// Maximum output channels (0 = input-only device)
    pub output_channels: u16,
}

/// Result of resolving an output device specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDevice {
    /// Let the platform choose
    Default,
    /// Device at this enumeration index; negative or out-of-range values
    /// fail when the stream is opened
    Index(i64),
}

impl fmt::Display for ResolvedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDevice::Default => write!(f, "default"),
            ResolvedDevice::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Resolve an output device specifier.
///
/// Integer specifiers (negative ones included) are returned unchecked; an
/// invalid index surfaces later when the playback stream is opened. Name
/// fragments are matched case-insensitively against output-capable devices,
/// first match wins.
/// `enumerate` is only called for name fragments.
pub fn resolve_output_device<F>(spec: Option<&str>, enumerate: F) -> ResolvedDevice
where
    F: FnOnce() -> SessionResult<Vec<DeviceInfo>>,
{
    let Some(spec) = spec.map(str::trim).filter(|s| !s.is_empty()) else {
        return ResolvedDevice::Default;
    };

    if let Ok(index) = spec.parse::<i64>() {
        return ResolvedDevice::Index(index);
    }

    let devices = match enumerate() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Could not enumerate output devices ({}); using system default", e);
            return ResolvedDevice::Default;
        }
    };

    let wanted = spec.to_lowercase();
    let found = devices
        .iter()
        .filter(|dev| dev.output_channels > 0)
        .find(|dev| dev.name.to_lowercase().contains(&wanted));

    match found {
        Some(dev) => {
            debug!("Output device '{}' resolved to #{} ({})", spec, dev.index, dev.name);
            ResolvedDevice::Index(dev.index as i64)
        }
        None => {
            warn!("Output device matching '{}' not found; using system default", spec);
            ResolvedDevice::Default
        }
    }
}
