//! Device handler framework
//!
//! One handler per device class, each owning its registry exclusively. The
//! trait covers the full capability set: event classification, typed
//! commands, power lifecycle reactions, and status queries.

pub mod bluetooth;
pub mod factory;
pub mod storage;
pub mod usb;

pub use bluetooth::BluetoothHandler;
pub use factory::{HandlerConstructor, HandlerFactory};
pub use storage::{MountServiceClient, Mounter, StorageHandler};
pub use usb::UsbAccessoryHandler;

use event::{CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus, EventAction, PowerEvent};
use tracing::warn;

/// Per-class device handler
///
/// Created at most once per class and living for the process lifetime. All
/// methods run on the single device worker thread; no call is re-entrant.
pub trait DeviceHandler: Send {
    /// Class this handler owns
    fn class(&self) -> DeviceClass;

    /// Classify and process one event; returns whether it was consumed
    fn handle_event(&mut self, event: &DeviceEvent) -> bool;

    /// Execute a typed command against a record identified by number
    fn handle_command(&mut self, command: &DeviceCommand) -> CommandOutcome;

    /// React to a power lifecycle signal
    fn handle_power_event(&mut self, event: PowerEvent);

    /// Snapshot every live record's public fields
    fn query_status(&self) -> Vec<DeviceStatus>;

    /// Destroy all remaining records and release shared resources
    fn shutdown(&mut self);
}

/// Parse the event action, logging and swallowing anything out of range
///
/// An unknown action never aborts processing for the remaining handlers;
/// the event is simply dropped for this one.
pub(crate) fn classify_action(event: &DeviceEvent) -> Option<EventAction> {
    match event.action() {
        Ok(action) => Some(action),
        Err(e) => {
            warn!("dropping event with unclassifiable action: {}", e);
            None
        }
    }
}
