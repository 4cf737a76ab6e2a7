//! Interface to the Android Debug Bridge command-line tool.
//!
//! This module provides the command channel used by every device operation:
//! a [`CommandRunner`] trait with a production implementation ([`Adb`]) that
//! shells out through `sh -c`, plus parsing of `adb devices` output into
//! [`DeviceInfo`] records.
//!
//! # Requirements
//!
//! The Android SDK platform tools must be installed so that `adb` is on the
//! `PATH`.
//!
//! # Example
//!
//! ```no_run
//! use adbpilot_core::adb::{Adb, list_devices};
//!
//! let adb = Adb::new();
//! let devices = list_devices(&adb, true).unwrap();
//! for device in &devices {
//!     println!("{} ({})", device.id, device.state);
//! }
//! ```

use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Errors raised by the command channel itself.
///
/// Transport failures are never retried by the core; they surface
/// immediately to the caller (polling predicates abort on them rather than
/// treating them as "not yet true").
#[derive(Error, Debug)]
pub enum TransportError {
    /// The command exited non-zero. Carries the captured stderr.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// An I/O error occurred while spawning or reading the command.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The command channel: accepts a command string, returns captured output.
///
/// All device actions (screen size query, dump trigger, app start/stop,
/// swipe, package query) are expressed as calls through this trait.
/// Implementations must be cheap to call repeatedly since polling re-issues
/// commands on every attempt. Tests substitute a scripted implementation.
pub trait CommandRunner: Send + Sync {
    /// Execute `cmd` and return its captured stdout.
    fn exec(&self, cmd: &str) -> Result<String, TransportError>;
}

/// Production command channel that runs commands through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Adb;

impl Adb {
    pub fn new() -> Self {
        Adb
    }
}

impl CommandRunner for Adb {
    fn exec(&self, cmd: &str) -> Result<String, TransportError> {
        debug!(command = cmd, "exec");
        let output = Command::new("sh").args(["-c", cmd]).output()?;

        if !output.status.success() {
            return Err(TransportError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// One entry from `adb devices` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The device identifier: a serial number or `emulator-XXXX`.
    pub id: String,

    /// The connection state as reported by adb
    /// (e.g., "device", "unauthorized", "offline").
    pub state: String,
}

impl DeviceInfo {
    /// Whether adb has an authorized shell connection to this device.
    pub fn is_authorized(&self) -> bool {
        self.state == "device"
    }

    /// Whether the identifier follows the emulator naming convention.
    pub fn is_emulator(&self) -> bool {
        self.id.contains("emulator")
    }
}

/// Lists the devices currently visible to adb.
///
/// Runs `adb devices` through the given channel and parses the output.
/// With `only_authorized` set, unauthorized and offline entries are
/// filtered out.
///
/// This is callable cheaply and repeatedly; the emulator lifecycle polls it
/// by diffing result length across calls.
///
/// # Errors
///
/// - [`TransportError`] if the command channel fails
pub fn list_devices(
    runner: &dyn CommandRunner,
    only_authorized: bool,
) -> Result<Vec<DeviceInfo>, TransportError> {
    let output = runner.exec("adb devices")?;
    Ok(parse_device_list(&output, only_authorized))
}

/// Parses `adb devices` output into a list of [`DeviceInfo`].
///
/// Skips the header line, blank lines, and daemon startup notices. Exposed
/// separately from [`list_devices`] so the parsing can be tested without a
/// live adb server.
pub fn parse_device_list(output: &str, only_authorized: bool) -> Vec<DeviceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
                return None;
            }
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let state = parts.next().unwrap_or_default().to_string();
            Some(DeviceInfo { id, state })
        })
        .filter(|info| !only_authorized || info.is_authorized())
        .collect()
}

/// Returns the first device in the list whose identifier follows the
/// emulator naming convention, if any.
pub fn first_emulator(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices.iter().find(|d| d.is_emulator())
}
