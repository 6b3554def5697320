//! Device event and command types for hotplugd
//!
//! This crate defines the normalized device event carrier, device class and
//! action tags, typed commands, and the status snapshots shared between the
//! daemon core and its external surfaces (event source, IPC, subscribers).

pub mod command;
pub mod error;
pub mod event;
pub mod status;

pub use command::{CommandKind, CommandOutcome, DeviceCommand, PowerEvent};
pub use error::{EventError, Result};
pub use event::{DeviceEvent, EventAction, attr};
pub use status::{DeviceClass, DeviceStatus, NotifyAction};
