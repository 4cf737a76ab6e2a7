//! CLI for Android device and emulator automation via adbpilot.
//!
//! # Usage
//!
//! ```bash
//! # List devices visible to adb
//! adbpilot devices
//!
//! # Query screen geometry
//! adbpilot screen-size
//!
//! # Print the raw UI hierarchy dump
//! adbpilot dump
//!
//! # Wait until text is visible on screen
//! adbpilot wait-text "Search or type web address" -a 10
//!
//! # Check which of several strings are on screen
//! adbpilot has-text "Sign in" "Settings"
//!
//! # Start and stop an app
//! adbpilot start-app com.android.chrome com.google.android.apps.chrome.Main
//! adbpilot stop-app com.android.chrome
//!
//! # Check whether a package is installed
//! adbpilot installed com.android.chrome
//!
//! # Gestures
//! adbpilot swipe 540 1820 540 100
//! adbpilot tap 540 960
//!
//! # Launch an AVD and wait for it to join the device list
//! adbpilot start-avd pixel_api_33
//!
//! # Wait for boot completion
//! adbpilot wait-ready -a 30
//!
//! # Target a specific device
//! adbpilot -s emulator-5554 screen-size
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use adbpilot_core::adb::{self, Adb, CommandRunner};
use adbpilot_core::config::PilotConfig;
use adbpilot_core::device::{App, DeviceError, DeviceSession};
use adbpilot_core::emulator;
use adbpilot_core::poll::Poller;

/// CLI for Android device and emulator automation.
#[derive(Parser)]
#[command(name = "adbpilot")]
#[command(about = "Drive Android devices and emulators over adb")]
#[command(version)]
struct Cli {
    /// Device serial to target (defaults to the first authorized device)
    #[arg(short, long, env = "ADBPILOT_SERIAL")]
    serial: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List devices visible to adb
    Devices {
        /// Include unauthorized and offline devices
        #[arg(long)]
        all: bool,
    },

    /// Query and print the device screen geometry
    ScreenSize,

    /// Print the raw UI hierarchy dump XML
    Dump {
        /// Reuse an existing dump instead of forcing a fresh one
        #[arg(long)]
        cached: bool,
    },

    /// Wait until the given text is visible on screen
    WaitText {
        /// Text to look for (case-sensitive substring)
        text: String,
        /// Maximum number of attempts
        #[arg(short, long, default_value = "5")]
        attempts: u32,
    },

    /// Report which of the given strings are currently on screen
    HasText {
        /// Candidate strings
        texts: Vec<String>,
        /// Reuse an existing dump instead of forcing a fresh one
        #[arg(long)]
        cached: bool,
    },

    /// Start an app by package (and optional activity)
    StartApp {
        /// Package identifier
        package: String,
        /// Entry activity; launched via launcher intent when omitted
        activity: Option<String>,
    },

    /// Force-stop an app
    StopApp {
        /// Package identifier
        package: String,
    },

    /// Check whether a package is installed
    Installed {
        /// Package identifier
        package: String,
    },

    /// Issue a swipe gesture
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    },

    /// Tap at screen coordinates
    Tap { x: i32, y: i32 },

    /// Launch an AVD and wait for it to join the device list
    StartAvd {
        /// AVD name as known to the emulator tool
        name: String,
        /// Maximum number of device-list polls
        #[arg(short, long, default_value = "30")]
        attempts: u32,
        /// Poll interval in milliseconds
        #[arg(short, long, default_value = "2000")]
        interval: u64,
    },

    /// Wait until the device reports boot completion
    WaitReady {
        /// Maximum number of attempts
        #[arg(short, long, default_value = "30")]
        attempts: u32,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(Adb::new());

    match cli.command {
        Command::Devices { all } => {
            let devices = adb::list_devices(runner.as_ref(), !all)?;
            for device in &devices {
                println!("{}\t{}", device.id, device.state);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::ScreenSize => {
            let mut session = pick_session(&runner, cli.serial)?;
            session.screen_size()?;
            println!("{}x{}", session.screen.width, session.screen.height);
            Ok(ExitCode::SUCCESS)
        }

        Command::Dump { cached } => {
            let mut session = pick_session(&runner, cli.serial)?;
            let xml = session.xml_screen(!cached)?;
            print!("{xml}");
            Ok(ExitCode::SUCCESS)
        }

        Command::WaitText { text, attempts } => {
            let mut session = pick_session(&runner, cli.serial)?;
            match session.wait_in_screen(attempts, &text) {
                Ok(()) => {
                    println!("found");
                    Ok(ExitCode::SUCCESS)
                }
                // Exhaustion is the expected failure mode; report it
                // distinctly from hard faults.
                Err(DeviceError::NotFound { text, attempts }) => {
                    eprintln!("timed out: \"{text}\" not visible after {attempts} attempts");
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err.into()),
            }
        }

        Command::HasText { texts, cached } => {
            let mut session = pick_session(&runner, cli.serial)?;
            let present = session.has_in_screen(cached, &texts)?;
            for (text, found) in texts.iter().zip(&present) {
                println!("{}\t{}", if *found { "yes" } else { "no " }, text);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::StartApp { package, activity } => {
            let mut session = pick_session(&runner, cli.serial)?;
            let app = match activity {
                Some(activity) => App::new(package, activity),
                None => App::package_only(package),
            };
            session.start_app(&app, "")?;
            Ok(ExitCode::SUCCESS)
        }

        Command::StopApp { package } => {
            let mut session = pick_session(&runner, cli.serial)?;
            session.close_app(&package);
            Ok(ExitCode::SUCCESS)
        }

        Command::Installed { package } => {
            let mut session = pick_session(&runner, cli.serial)?;
            if session.installed_app(&package)? {
                println!("installed");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("not installed");
                Ok(ExitCode::FAILURE)
            }
        }

        Command::Swipe { x1, y1, x2, y2 } => {
            let mut session = pick_session(&runner, cli.serial)?;
            session.swipe([x1, y1, x2, y2])?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Tap { x, y } => {
            let mut session = pick_session(&runner, cli.serial)?;
            session.tap(x, y)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::StartAvd {
            name,
            attempts,
            interval,
        } => {
            let baseline = adb::list_devices(runner.as_ref(), false)?.len();
            let mut handle = emulator::start_avd(&name)?;

            let poller = Poller::new();
            let interval = Duration::from_millis(interval);
            let running = emulator::wait_for_emulator(
                runner.as_ref(),
                &poller,
                baseline,
                interval,
                attempts,
            )?;

            if !running {
                handle.stop();
                return Err(emulator::EmulatorError::StartupTimeout(name).into());
            }

            let devices = adb::list_devices(runner.as_ref(), false)?;
            if let Some(device) = adb::first_emulator(&devices) {
                println!("{}", device.id);
            }
            // Dropping the handle leaves the emulator running; stopping it
            // is up to the caller (e.g. `adb -s <id> emu kill`).
            Ok(ExitCode::SUCCESS)
        }

        Command::WaitReady { attempts } => {
            let mut session = pick_session(&runner, cli.serial)?;
            if session.wait_device_ready(attempts)? {
                println!("ready");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("timed out: device not ready after {attempts} attempts");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Builds a session for the requested serial, or for the first authorized
/// device when none was given. Applies persistent config overrides.
fn pick_session(
    runner: &Arc<dyn CommandRunner>,
    serial: Option<String>,
) -> Result<DeviceSession, Box<dyn std::error::Error>> {
    let config = PilotConfig::load();
    let id = match serial {
        Some(serial) => serial,
        None => {
            let devices = adb::list_devices(runner.as_ref(), true)?;
            devices
                .first()
                .map(|d| d.id.clone())
                .ok_or("no authorized device connected")?
        }
    };
    Ok(DeviceSession::from_config(runner.clone(), id, &config))
}
