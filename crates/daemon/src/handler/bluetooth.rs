//! Bluetooth adapter handler
//!
//! Thin instantiation of the framework: tracks adapters announced on the
//! bluetooth and rfkill subsystems, keeping the adapter name as payload.

use crate::handler::{DeviceHandler, classify_action};
use crate::notify::Notifier;
use crate::registry::DeviceRegistry;
use event::{
    CommandKind, CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus,
    EventAction, NotifyAction, PowerEvent, attr,
};
use tracing::{debug, info};

/// Class-specific payload for Bluetooth adapters
#[derive(Debug, Clone, Default)]
pub struct BluetoothPayload {
    pub adapter_name: Option<String>,
}

pub struct BluetoothHandler {
    registry: DeviceRegistry<BluetoothPayload>,
    notifier: Notifier,
}

impl BluetoothHandler {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            notifier,
        }
    }

    fn claims(&self, event: &DeviceEvent) -> bool {
        matches!(event.subsystem(), Some("bluetooth") | Some("rfkill"))
    }

    fn on_add(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            debug!("bluetooth add event without device path, ignoring");
            return;
        };
        let path = path.to_string();

        let record = self.registry.upsert_with(&path, BluetoothPayload::default);
        record.apply_event(event);
        if let Some(name) = event.get(attr::NAME) {
            record.payload.adapter_name = Some(name.to_string());
        }
        let status = record.status(DeviceClass::Bluetooth);

        info!(
            "bluetooth adapter {} ({}) attached as number {}",
            path,
            record.payload.adapter_name.as_deref().unwrap_or("unnamed"),
            status.device_number
        );
        self.notifier
            .notify(DeviceClass::Bluetooth, NotifyAction::Add, &status);
    }

    fn on_remove(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            return;
        };
        match self.registry.remove(path) {
            Some(record) => {
                let status = record.status(DeviceClass::Bluetooth);
                info!("bluetooth adapter {} detached", path);
                self.notifier
                    .notify(DeviceClass::Bluetooth, NotifyAction::Remove, &status);
            }
            None => debug!("remove for untracked bluetooth path {}, ignoring", path),
        }
    }
}

impl DeviceHandler for BluetoothHandler {
    fn class(&self) -> DeviceClass {
        DeviceClass::Bluetooth
    }

    fn handle_event(&mut self, event: &DeviceEvent) -> bool {
        if !self.claims(event) {
            return false;
        }
        let Some(action) = classify_action(event) else {
            return true;
        };

        match action {
            EventAction::Add | EventAction::Change => self.on_add(event),
            EventAction::Remove => self.on_remove(event),
        }
        true
    }

    fn handle_command(&mut self, command: &DeviceCommand) -> CommandOutcome {
        match command.kind {
            CommandKind::Eject => CommandOutcome::NotSupported,
        }
    }

    fn handle_power_event(&mut self, event: PowerEvent) {
        match event {
            PowerEvent::SuspendRequested => {
                for record in self.registry.iter_mut() {
                    record.power_status = false;
                }
            }
            PowerEvent::ResumePreparing => {
                for record in self.registry.iter_mut() {
                    record.power_status = true;
                }
            }
            PowerEvent::UnmountAllRequested => {}
        }
    }

    fn query_status(&self) -> Vec<DeviceStatus> {
        self.registry
            .iter()
            .map(|record| record.status(DeviceClass::Bluetooth))
            .collect()
    }

    fn shutdown(&mut self) {
        for record in self.registry.drain_all() {
            let status = record.status(DeviceClass::Bluetooth);
            self.notifier
                .notify(DeviceClass::Bluetooth, NotifyAction::Remove, &status);
        }
    }
}
