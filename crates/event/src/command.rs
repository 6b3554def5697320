//! Typed device commands and power lifecycle events

use serde::{Deserialize, Serialize};

/// Class-independent command kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Unmount and detach a storage device
    Eject,
}

/// Command targeting one device record by its number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub kind: CommandKind,
    pub device_number: u32,
}

/// Outcome of a dispatched command
///
/// Side effects complete before the outcome is constructed, so the outcome
/// reflects what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// Command executed
    Success,
    /// No record with the requested device number
    DeviceNotFound,
    /// The owning class does not implement this command kind
    NotSupported,
    /// Command attempted but failed partway
    Failed { message: String },
}

/// Power lifecycle signal delivered by the external power source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerEvent {
    /// System suspend is about to happen
    SuspendRequested,
    /// System is waking back up
    ResumePreparing,
    /// Force-unmount all mountable media immediately
    UnmountAllRequested,
}
