//! Lifecycle management for Android Virtual Devices.
//!
//! Launching an AVD follows the state machine
//! `NotStarted -> Starting -> Running -> Stopping -> Stopped`. The launch
//! itself only spawns the external `emulator` process (Starting); the
//! Running transition is observed externally by polling the adb device list
//! until it grows by one entry whose identifier follows the emulator naming
//! convention. Teardown mirrors this: [`StopHandle::stop`] kills the process
//! (Stopping), and Stopped is observed by polling the device count back down
//! to its baseline.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use adbpilot_core::adb::{self, Adb};
//! use adbpilot_core::emulator::{start_avd, wait_for_emulator};
//! use adbpilot_core::poll::Poller;
//!
//! let adb = Adb::new();
//! let baseline = adb::list_devices(&adb, false).unwrap().len();
//!
//! let mut handle = start_avd("pixel_api_33").unwrap();
//! let poller = Poller::new();
//! let running =
//!     wait_for_emulator(&adb, &poller, baseline, Duration::from_secs(2), 30).unwrap();
//! assert!(running);
//!
//! handle.stop();
//! ```

use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::adb::{list_devices, CommandRunner, TransportError};
use crate::poll::Poller;

/// Errors specific to virtual device lifecycle operations.
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// The `emulator` process failed to spawn outright.
    #[error("Failed to launch emulator process: {0}")]
    Launch(#[from] std::io::Error),

    /// A device enumeration through the command channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The emulator never joined the device list within the poll budget.
    #[error("Emulator '{0}' did not appear in the device list")]
    StartupTimeout(String),

    /// The emulator never left the device list within the poll budget.
    #[error("Emulator '{0}' did not leave the device list")]
    ShutdownTimeout(String),
}

/// Handle for stopping a launched virtual device.
///
/// Safe to invoke unconditionally: stopping twice, or stopping a handle that
/// never owned a process, is a no-op. Callers can therefore defer cleanup
/// without tracking whether the launch succeeded.
pub struct StopHandle {
    child: Option<std::process::Child>,
}

impl StopHandle {
    /// A handle with nothing to stop.
    pub fn noop() -> Self {
        Self { child: None }
    }

    /// Terminates the emulator process. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(pid = child.id(), "stopping emulator process");
            if let Err(err) = child.kill() {
                warn!(error = %err, "failed to kill emulator process");
            }
            let _ = child.wait();
        }
    }

    /// Whether the process has already been stopped (or never existed).
    pub fn is_stopped(&self) -> bool {
        self.child.is_none()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Launches the named AVD as an external process.
///
/// Does not block until boot completion: poll the device list via
/// [`wait_for_emulator`] to observe the Running transition, and the booted
/// session's `wait_device_ready` for full boot.
///
/// # Errors
///
/// - [`EmulatorError::Launch`] if the process fails to spawn
pub fn start_avd(name: &str) -> Result<StopHandle, EmulatorError> {
    debug!(avd = name, "launching emulator");
    let child = Command::new("emulator")
        .args(["-avd", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(StopHandle { child: Some(child) })
}

/// Polls device enumeration until the list has grown past `baseline` and
/// contains an emulator entry.
///
/// Returns `Ok(false)` when the budget is exhausted without observing the
/// Running transition.
pub fn wait_for_emulator(
    runner: &dyn CommandRunner,
    poller: &Poller,
    baseline: usize,
    interval: Duration,
    max_attempts: u32,
) -> Result<bool, TransportError> {
    poller.poll_until(interval, max_attempts, || {
        let devices = list_devices(runner, false)?;
        Ok(devices.len() > baseline && devices.iter().any(|d| d.is_emulator()))
    })
}

/// Polls device enumeration until the list has shrunk back to `baseline`,
/// observing the Stopped transition after [`StopHandle::stop`].
pub fn wait_for_shutdown(
    runner: &dyn CommandRunner,
    poller: &Poller,
    baseline: usize,
    interval: Duration,
    max_attempts: u32,
) -> Result<bool, TransportError> {
    poller.poll_until(interval, max_attempts, || {
        let devices = list_devices(runner, false)?;
        Ok(devices.len() <= baseline)
    })
}

/// Whether an emulator entry currently running answers to the given AVD
/// name.
///
/// Each emulator entry is asked for its AVD name over the console channel;
/// the first reported line carries the name.
pub fn is_avd_running(runner: &dyn CommandRunner, name: &str) -> Result<bool, TransportError> {
    let devices = list_devices(runner, false)?;
    for info in devices.iter().filter(|d| d.is_emulator()) {
        let output = runner.exec(&format!("adb -s {} emu avd name", info.id))?;
        if output.lines().next().map(str::trim) == Some(name) {
            return Ok(true);
        }
    }
    Ok(false)
}
