//! hotplugd core
//!
//! Device handler framework for the hotplug daemon: per-class handlers over
//! exclusive device registries, a constructor factory, notification fan-out,
//! the USB accessory-mode protocol engine, and the blocking worker thread
//! that ties them to the runtime.

pub mod config;
pub mod dispatch;
pub mod handler;
pub mod notify;
pub mod registry;
pub mod usb;
pub mod worker;
