//! # adbpilot-core
//!
//! Core library for Android device and emulator automation over adb.
//!
//! This crate drives a device exposed through the adb text command channel:
//! it discovers devices, launches and stops virtual ones, issues UI-level
//! actions, and verifies that expected states (app running, text visible,
//! device responsive) are reached within a bounded attempt budget.
//!
//! ## Modules
//!
//! - [`adb`] - Command channel trait and wrapper around the `adb` CLI,
//!   plus device enumeration
//! - [`dump`] - Parser for `uiautomator` hierarchy dumps into queryable
//!   node trees
//! - [`poll`] - Generic poll-until-condition engine with an injectable clock
//! - [`device`] - Per-device sessions composing waits and actions
//! - [`emulator`] - AVD process lifecycle with device-list polling
//! - [`config`] - Persistent user configuration
//!
//! ## External Dependencies
//!
//! The following external tools must be installed:
//!
//! - **adb** (Android SDK platform tools) - the device command channel
//! - **emulator** (Android SDK) - only needed for AVD lifecycle operations
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use adbpilot_core::adb::Adb;
//! use adbpilot_core::device::{devices, App};
//!
//! let runner = Arc::new(Adb::new());
//! let mut session = devices(runner, true).expect("adb unavailable").remove(0);
//!
//! session.screen_size().expect("geometry query failed");
//! assert!(session.screen.width > 0 && session.screen.height > 0);
//!
//! let chrome = App::new("com.android.chrome", "com.google.android.apps.chrome.Main");
//! if session.installed_app(&chrome.package).unwrap() {
//!     session.start_app(&chrome, "").unwrap();
//!     session.wait_in_screen(5, "Search or type web address").unwrap();
//! }
//! ```

pub mod adb;
pub mod config;
pub mod device;
pub mod dump;
pub mod emulator;
pub mod poll;
