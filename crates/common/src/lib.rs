//! Common utilities for hotplugd
//!
//! This crate provides shared functionality between the daemon core and its
//! surfaces: error handling, logging setup, the async channel bridge for the
//! device worker thread, and test helpers.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{DaemonBridge, DaemonCommand, DaemonEvent, DaemonWorker, create_daemon_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
