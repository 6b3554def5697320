//! USB accessory-mode handler
//!
//! Owns the registry of accessory-mode USB devices and drives the AOA
//! handshake for devices that look switchable: a standalone USB device node
//! whose interface class is HID or vendor-specific and whose identifiers
//! are not already in the accessory range. Successfully switched devices
//! re-enumerate and come back as plain accessory-mode adds.

use crate::handler::{DeviceHandler, classify_action};
use crate::notify::Notifier;
use crate::registry::DeviceRegistry;
use crate::usb::host::{RusbHostProvider, UsbHost, UsbHostError, UsbHostProvider};
use crate::usb::{AccessoryIdentity, AoaError, in_accessory_mode, open_with_retry, run_handshake};
use event::{
    CommandKind, CommandOutcome, DeviceClass, DeviceCommand, DeviceEvent, DeviceStatus,
    EventAction, NotifyAction, PowerEvent,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Interface class bytes that mark a handshake candidate
const INTERFACE_CLASS_HID: u8 = 0x03;
const INTERFACE_CLASS_VENDOR: u8 = 0xff;

/// Class-specific payload for accessory devices
#[derive(Debug, Clone, Default)]
pub struct UsbPayload {
    /// Set when the record was created from accessory-range identifiers
    pub accessory_mode: bool,
}

pub struct UsbAccessoryHandler {
    registry: DeviceRegistry<UsbPayload>,
    notifier: Notifier,
    identity: AccessoryIdentity,
    provider: Box<dyn UsbHostProvider>,
    /// Shared USB context; present only while the registry is occupied
    host: Option<Arc<dyn UsbHost>>,
}

impl UsbAccessoryHandler {
    pub fn new(identity: AccessoryIdentity, notifier: Notifier) -> Self {
        Self::with_provider(identity, notifier, Box::new(RusbHostProvider))
    }

    /// Constructor with an injected USB host provider (used by tests)
    pub fn with_provider(
        identity: AccessoryIdentity,
        notifier: Notifier,
        provider: Box<dyn UsbHostProvider>,
    ) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            notifier,
            identity,
            provider,
            host: None,
        }
    }

    /// Whether the shared USB context is currently held
    pub fn has_host_context(&self) -> bool {
        self.host.is_some()
    }

    fn claims(&self, event: &DeviceEvent) -> bool {
        if event.subsystem() != Some("usb") || event.devtype() != Some("usb_device") {
            return false;
        }

        // Remove events carry few attributes; a tracked path is claim enough.
        if let Some(path) = event.device_path()
            && self.registry.get(path).is_some()
        {
            return true;
        }

        if let (Ok(vendor_id), Ok(product_id)) = (event.vendor_id(), event.product_id())
            && in_accessory_mode(vendor_id, product_id)
        {
            return true;
        }

        matches!(
            event.interface_class(),
            Ok(INTERFACE_CLASS_HID) | Ok(INTERFACE_CLASS_VENDOR)
        )
    }

    fn on_add(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            warn!("usb add event without device path, ignoring");
            return;
        };

        // A tracked path refreshes in place. Refresh events may carry fewer
        // attributes than the initial announcement, so this never depends on
        // id parseability and never re-enters the handshake.
        if self.registry.get(path).is_some() {
            let path = path.to_string();
            let record = self.registry.upsert_with(&path, UsbPayload::default);
            record.apply_event(event);
            let status = record.status(DeviceClass::Usb);

            debug!("usb device {} refreshed", path);
            self.notifier.notify(DeviceClass::Usb, NotifyAction::Add, &status);
            return;
        }

        let (vendor_id, product_id) = match (event.vendor_id(), event.product_id()) {
            (Ok(v), Ok(p)) => (v, p),
            _ => {
                warn!("usb add event for {} without parsable ids, ignoring", path);
                return;
            }
        };

        if in_accessory_mode(vendor_id, product_id) {
            let path = path.to_string();
            let record = self.registry.upsert_with(&path, UsbPayload::default);
            record.apply_event(event);
            record.payload.accessory_mode = true;
            let status = record.status(DeviceClass::Usb);

            info!(
                "accessory device {} attached as number {}",
                path, status.device_number
            );
            self.notifier.notify(DeviceClass::Usb, NotifyAction::Add, &status);
        } else {
            // Switchable candidate: run the handshake, publish nothing. The
            // device re-enumerates with accessory identifiers on success.
            match self.switch_to_accessory(vendor_id, product_id) {
                Ok(version) => info!(
                    "accessory handshake complete for {:04x}:{:04x} (protocol version {})",
                    vendor_id, product_id, version
                ),
                Err(e) => warn!(
                    "accessory handshake failed for {:04x}:{:04x}: {}",
                    vendor_id, product_id, e
                ),
            }
        }
    }

    fn on_remove(&mut self, event: &DeviceEvent) {
        let Some(path) = event.device_path() else {
            return;
        };
        match self.registry.remove(path) {
            Some(record) => {
                let status = record.status(DeviceClass::Usb);
                info!("accessory device {} detached", path);
                self.notifier
                    .notify(DeviceClass::Usb, NotifyAction::Remove, &status);
            }
            None => debug!("remove for untracked usb path {}, ignoring", path),
        }
    }

    fn switch_to_accessory(&mut self, vendor_id: u16, product_id: u16) -> Result<u16, AoaError> {
        let host = self.acquire_host()?;
        let mut port = open_with_retry(host.as_ref(), vendor_id, product_id)?;
        run_handshake(port.as_mut(), &self.identity)
    }

    /// Lazily create the shared USB context on first need
    fn acquire_host(&mut self) -> Result<Arc<dyn UsbHost>, UsbHostError> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let host = self.provider.acquire()?;
        self.host = Some(host.clone());
        Ok(host)
    }

    /// Drop the shared context once no device needs it
    fn release_host_if_idle(&mut self) {
        if self.registry.is_empty() && self.host.take().is_some() {
            debug!("usb registry empty, releasing host context");
        }
    }
}

impl DeviceHandler for UsbAccessoryHandler {
    fn class(&self) -> DeviceClass {
        DeviceClass::Usb
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

        self.release_host_if_idle();
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
            PowerEvent::UnmountAllRequested => {
                // Nothing mountable in this class.
            }
        }
    }

    fn query_status(&self) -> Vec<DeviceStatus> {
        self.registry
            .iter()
            .map(|record| record.status(DeviceClass::Usb))
            .collect()
    }

    fn shutdown(&mut self) {
        for record in self.registry.drain_all() {
            let status = record.status(DeviceClass::Usb);
            self.notifier
                .notify(DeviceClass::Usb, NotifyAction::Remove, &status);
        }
        self.host = None;
    }
}
