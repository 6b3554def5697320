//! Event and command routing
//!
//! The dispatcher owns every handler instance for the process lifetime and
//! routes events, commands, and power signals to them on the single device
//! worker thread.

use crate::handler::DeviceHandler;
use event::{CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus, PowerEvent};
use tracing::debug;

pub struct Dispatcher {
    /// Handlers in registration order, which is also offer order
    handlers: Vec<Box<dyn DeviceHandler>>,
}

impl Dispatcher {
    pub fn new(handlers: Vec<Box<dyn DeviceHandler>>) -> Self {
        Self { handlers }
    }

    /// Offer an event to each handler until one claims it
    ///
    /// Class predicates are not proven mutually exclusive; when they
    /// overlap, the first registered handler wins. Returns whether any
    /// handler consumed the event.
    pub fn dispatch_event(&mut self, event: &DeviceEvent) -> bool {
        for handler in &mut self.handlers {
            if handler.handle_event(event) {
                return true;
            }
        }
        debug!(
            "event not claimed by any handler (subsystem {:?}, path {:?})",
            event.subsystem(),
            event.device_path()
        );
        false
    }

    /// Route a command to the handler owning the class
    pub fn dispatch_command(&mut self, class: DeviceClass, command: &DeviceCommand) -> CommandOutcome {
        match self.handlers.iter_mut().find(|h| h.class() == class) {
            Some(handler) => handler.handle_command(command),
            None => CommandOutcome::NotSupported,
        }
    }

    /// Broadcast a power lifecycle signal to every handler
    pub fn dispatch_power_event(&mut self, event: PowerEvent) {
        for handler in &mut self.handlers {
            handler.handle_power_event(event);
        }
    }

    /// Snapshot every live record across all classes
    pub fn query_status(&self) -> Vec<DeviceStatus> {
        self.handlers
            .iter()
            .flat_map(|handler| handler.query_status())
            .collect()
    }

    /// Tear every handler down, destroying all remaining records
    pub fn shutdown(&mut self) {
        for handler in &mut self.handlers {
            handler.shutdown();
        }
    }
}
