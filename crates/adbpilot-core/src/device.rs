//! Device sessions: high-level operations against one Android device.
//!
//! A [`DeviceSession`] aggregates a device identity, its screen geometry,
//! the on-device hierarchy dump location, and default timing parameters. It
//! exposes the wait-style operations (text on screen, app running, device
//! booted) by composing the [`crate::poll`] engine with predicates built
//! over [`crate::dump`] output, plus the direct action primitives (start and
//! stop apps, swipe, tap).
//!
//! # Concurrency
//!
//! Sessions are single-threaded and blocking: every wait occupies its
//! calling thread for up to `interval x max_attempts`. A session's fields
//! are not protected by any lock; use one session per thread and serialize
//! operations against the same physical device.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use adbpilot_core::adb::Adb;
//! use adbpilot_core::device::{devices, App};
//!
//! let runner = Arc::new(Adb::new());
//! let mut session = devices(runner, true).unwrap().remove(0);
//!
//! session.screen_size().unwrap();
//! let chrome = App::new("com.android.chrome", "com.google.android.apps.chrome.Main");
//! session.start_app(&chrome, "").unwrap();
//! session.wait_in_screen(5, "Search or type web address").unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::adb::{self, CommandRunner, TransportError};
use crate::config::PilotConfig;
use crate::dump::{parse_document, ParseError, UiNode};
use crate::poll::Poller;

/// Default poll tick between wait attempts.
pub const DEFAULT_SLEEP: Duration = Duration::from_millis(300);

/// Default on-device path where hierarchy dumps are materialized.
pub const DEFAULT_DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Errors raised by device session operations.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The command channel failed. Surfaced immediately, never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The hierarchy dump was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A wait predicate was never satisfied within the attempt budget.
    /// The expected, common failure mode of every wait operation.
    #[error("\"{text}\" not found on screen after {attempts} attempts")]
    NotFound { text: String, attempts: u32 },

    /// A command succeeded but produced output the session cannot interpret.
    #[error("Unexpected command output: {0}")]
    UnexpectedOutput(String),

    /// The activity manager rejected an app start intent.
    #[error("Failed to start {package}: {detail}")]
    StartApp { package: String, detail: String },
}

/// Current screen geometry of a device, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Screen {
    /// Builds the coordinate tuple for a vertical swipe-up gesture:
    /// midpoint x, from near the bottom edge to near the top.
    pub fn swipe_up_vector(&self) -> [i32; 4] {
        let x = (self.width / 2) as i32;
        let bottom = self.height.saturating_sub(100) as i32;
        [x, bottom, x, 100]
    }
}

/// An app identity: package identifier plus optional entry activity.
///
/// A lookup key, not a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub package: String,
    pub activity: Option<String>,
}

impl App {
    pub fn new(package: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            activity: Some(activity.into()),
        }
    }

    /// An app known only by package; started via its launcher intent.
    pub fn package_only(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            activity: None,
        }
    }
}

/// A session against one device, identified by serial or emulator id.
pub struct DeviceSession {
    /// The device identifier (serial or `emulator-XXXX`).
    pub id: String,

    /// Screen geometry; zero until [`DeviceSession::screen_size`] runs.
    pub screen: Screen,

    /// On-device path where hierarchy dumps are materialized.
    pub dump_path: String,

    /// Default poll tick for wait operations.
    pub default_sleep: Duration,

    runner: Arc<dyn CommandRunner>,
    poller: Poller,
}

impl DeviceSession {
    /// Creates a session with default dump path and timing.
    pub fn new(runner: Arc<dyn CommandRunner>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            screen: Screen::default(),
            dump_path: DEFAULT_DUMP_PATH.to_string(),
            default_sleep: DEFAULT_SLEEP,
            runner,
            poller: Poller::new(),
        }
    }

    /// Creates a session with dump path and timing overrides applied from
    /// persistent configuration.
    pub fn from_config(
        runner: Arc<dyn CommandRunner>,
        id: impl Into<String>,
        config: &PilotConfig,
    ) -> Self {
        let mut session = Self::new(runner, id);
        if let Some(ms) = config.default_sleep_ms {
            session.default_sleep = Duration::from_millis(ms);
        }
        if let Some(path) = &config.dump_path {
            session.dump_path = path.clone();
        }
        session
    }

    /// Replaces the polling engine, typically to inject a fake clock.
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Runs a shell command on this device through the command channel.
    pub fn shell(&self, cmd: &str) -> Result<String, TransportError> {
        self.runner.exec(&format!("adb -s {} shell {}", self.id, cmd))
    }

    /// Queries the display geometry via `wm size` and populates
    /// [`DeviceSession::screen`].
    ///
    /// When an override size is reported it wins over the physical size,
    /// since it is what the compositor actually uses.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::UnexpectedOutput`] if the geometry query output is
    ///   unparsable
    pub fn screen_size(&mut self) -> Result<(), DeviceError> {
        let output = self.shell("wm size")?;
        let screen = parse_screen_size(&output)
            .ok_or_else(|| DeviceError::UnexpectedOutput(output.trim().to_string()))?;
        self.screen = screen;
        Ok(())
    }

    /// Whether a dump file is already materialized at
    /// [`DeviceSession::dump_path`].
    ///
    /// Checked by listing the path through the command channel and comparing
    /// the returned text, whitespace-trimmed, to the expected path string.
    pub fn dump_present(&self) -> Result<bool, TransportError> {
        let listing = self.shell(&format!("ls {}", self.dump_path))?;
        Ok(listing.trim() == self.dump_path)
    }

    /// Fetches the raw hierarchy dump XML.
    ///
    /// With `new_dump` set, or when no dump exists at the dump path yet, a
    /// fresh `uiautomator dump` is triggered first; otherwise the existing
    /// file is reused.
    pub fn xml_screen(&mut self, new_dump: bool) -> Result<String, DeviceError> {
        if new_dump || !self.dump_present()? {
            self.shell(&format!("uiautomator dump {}", self.dump_path))?;
        }
        Ok(self.shell(&format!("cat {}", self.dump_path))?)
    }

    /// Returns the flattened node list of the current screen, in depth-first
    /// preorder.
    ///
    /// With `use_cache` set, a dump already materialized at the dump path is
    /// reused instead of re-dumping.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Parse`] if the dump is malformed; never silently
    ///   swallowed into an empty list
    pub fn node_list(&mut self, use_cache: bool) -> Result<Vec<UiNode>, DeviceError> {
        let xml = self.xml_screen(!use_cache)?;
        let root = parse_document(&xml)?;
        Ok(root.flatten())
    }

    /// Waits until a node whose text contains `text` (case-sensitive
    /// substring) appears on screen, re-dumping and re-parsing the hierarchy
    /// on every attempt. Polls every [`DeviceSession::default_sleep`].
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NotFound`] after exhausting `max_attempts`
    /// - [`DeviceError::Transport`] / [`DeviceError::Parse`] immediately on
    ///   a hard fault inside an attempt
    pub fn wait_in_screen(&mut self, max_attempts: u32, text: &str) -> Result<(), DeviceError> {
        let poller = self.poller.clone();
        let interval = self.default_sleep;

        let found = poller.poll_until(interval, max_attempts, || {
            let nodes = self.node_list(false)?;
            Ok::<bool, DeviceError>(nodes.iter().any(|n| n.text().contains(text)))
        })?;

        if found {
            Ok(())
        } else {
            Err(DeviceError::NotFound {
                text: text.to_string(),
                attempts: max_attempts,
            })
        }
    }

    /// Waits until `pkg` shows up in the window manager state, polling every
    /// `poll_interval`.
    ///
    /// Returns `Ok(false)` when the budget is exhausted; the caller decides
    /// whether that is a failure.
    pub fn wait_app(
        &mut self,
        pkg: &str,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<bool, DeviceError> {
        let poller = self.poller.clone();
        poller.poll_until(poll_interval, max_attempts, || {
            let output = self.shell("dumpsys window windows")?;
            Ok::<bool, DeviceError>(output.contains(pkg))
        })
    }

    /// Waits until the device reports boot completion
    /// (`sys.boot_completed` property equal to `1`), polling every
    /// [`DeviceSession::default_sleep`].
    pub fn wait_device_ready(&mut self, max_attempts: u32) -> Result<bool, DeviceError> {
        let poller = self.poller.clone();
        let interval = self.default_sleep;
        poller.poll_until(interval, max_attempts, || {
            let output = self.shell("getprop sys.boot_completed")?;
            Ok::<bool, DeviceError>(output.trim() == "1")
        })
    }

    /// Reports which of the candidate strings are currently visible on
    /// screen, as a same-order, same-length vector of presence flags.
    ///
    /// The input sequence is borrowed immutably and never reordered.
    /// Absence is data, not an error.
    pub fn has_in_screen<S: AsRef<str>>(
        &mut self,
        use_cache: bool,
        texts: &[S],
    ) -> Result<Vec<bool>, DeviceError> {
        let nodes = self.node_list(use_cache)?;
        Ok(texts
            .iter()
            .map(|t| nodes.iter().any(|n| n.text().contains(t.as_ref())))
            .collect())
    }

    /// Starts an app via an explicit activity intent, or via the launcher
    /// monkey when only the package is known. `extra` is appended verbatim
    /// to the start command.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::StartApp`] when the activity manager reports an
    ///   error for the intent
    pub fn start_app(&mut self, app: &App, extra: &str) -> Result<(), DeviceError> {
        let cmd = match &app.activity {
            Some(activity) => {
                let mut cmd = format!("am start -n {}/{}", app.package, activity);
                if !extra.is_empty() {
                    cmd.push(' ');
                    cmd.push_str(extra);
                }
                cmd
            }
            None => format!(
                "monkey -p {} -c android.intent.category.LAUNCHER 1",
                app.package
            ),
        };

        let output = self.shell(&cmd)?;
        if output.contains("Error") || output.contains("Exception") {
            return Err(DeviceError::StartApp {
                package: app.package.clone(),
                detail: output.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Force-stops an app. Best-effort: a failure is logged and swallowed,
    /// and stopping an app that is not running is a no-op.
    pub fn close_app(&mut self, pkg: &str) {
        if let Err(err) = self.shell(&format!("am force-stop {pkg}")) {
            warn!(package = pkg, error = %err, "force-stop failed");
        }
    }

    /// Whether `pkg` is installed, via the package manager. Absence is a
    /// normal outcome, not an error.
    pub fn installed_app(&mut self, pkg: &str) -> Result<bool, DeviceError> {
        let output = self.shell(&format!("pm list packages {pkg}"))?;
        let needle = format!("package:{pkg}");
        Ok(output.lines().any(|line| line.trim() == needle))
    }

    /// Issues a drag gesture between two points. Coordinates are passed
    /// through in order (`x1 y1 x2 y2`); verifying the effect is the
    /// caller's job, typically via a subsequent
    /// [`DeviceSession::wait_in_screen`].
    pub fn swipe(&mut self, coords: [i32; 4]) -> Result<(), DeviceError> {
        self.shell(&format!(
            "input swipe {} {} {} {}",
            coords[0], coords[1], coords[2], coords[3]
        ))?;
        Ok(())
    }

    /// Taps at screen coordinates.
    pub fn tap(&mut self, x: i32, y: i32) -> Result<(), DeviceError> {
        self.shell(&format!("input tap {x} {y}"))?;
        Ok(())
    }

    /// Wakes the screen.
    pub fn wake_up(&mut self) -> Result<(), DeviceError> {
        self.shell("input keyevent KEYCODE_WAKEUP")?;
        Ok(())
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("screen", &self.screen)
            .field("dump_path", &self.dump_path)
            .field("default_sleep", &self.default_sleep)
            .finish_non_exhaustive()
    }
}

/// Builds a session for every device currently visible to adb, each bound
/// to the given command channel.
pub fn devices(
    runner: Arc<dyn CommandRunner>,
    only_authorized: bool,
) -> Result<Vec<DeviceSession>, TransportError> {
    let infos = adb::list_devices(runner.as_ref(), only_authorized)?;
    Ok(infos
        .into_iter()
        .map(|info| DeviceSession::new(runner.clone(), info.id))
        .collect())
}

fn parse_screen_size(output: &str) -> Option<Screen> {
    // `wm size` reports "Physical size: WxH" and, when active,
    // "Override size: WxH" on a later line. The last size line wins.
    let line = output.lines().filter(|l| l.contains("size:")).next_back()?;
    let dims = line.rsplit(':').next()?.trim();
    let (width, height) = dims.split_once('x')?;
    Some(Screen {
        width: width.trim().parse().ok()?,
        height: height.trim().parse().ok()?,
    })
}
