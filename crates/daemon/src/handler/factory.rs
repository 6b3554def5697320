//! Handler constructor table
//!
//! Built once during startup, before the first event is dispatched, and
//! read-only afterwards. Avoids static-registration tricks: the table is an
//! explicit value the process populates in one place.

use crate::config::DaemonConfig;
use crate::handler::{BluetoothHandler, DeviceHandler, StorageHandler, UsbAccessoryHandler};
use crate::notify::Notifier;
use event::DeviceClass;
use std::collections::HashMap;
use tracing::{debug, info};

/// Constructor for one handler class
pub type HandlerConstructor = fn(&DaemonConfig, Notifier) -> Box<dyn DeviceHandler>;

/// Mapping from device class to handler constructor
pub struct HandlerFactory {
    constructors: HashMap<DeviceClass, HandlerConstructor>,
    /// Registration order, which is also instantiation and dispatch order
    order: Vec<DeviceClass>,
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Factory pre-populated with every built-in handler
    pub fn with_builtin_handlers() -> Self {
        let mut factory = Self::new();
        factory.register(DeviceClass::Usb, |config, notifier| {
            Box::new(UsbAccessoryHandler::new(config.accessory.clone(), notifier))
        });
        factory.register(DeviceClass::Bluetooth, |_config, notifier| {
            Box::new(BluetoothHandler::new(notifier))
        });
        factory.register(DeviceClass::Storage, |_config, notifier| {
            Box::new(StorageHandler::new(notifier))
        });
        factory
    }

    /// Insert a constructor under a class key
    ///
    /// Returns false without replacing when the key already exists; the
    /// first registration is authoritative.
    pub fn register(&mut self, class: DeviceClass, constructor: HandlerConstructor) -> bool {
        if self.constructors.contains_key(&class) {
            debug!("handler for class {} already registered, ignoring", class);
            return false;
        }
        self.constructors.insert(class, constructor);
        self.order.push(class);
        true
    }

    /// Instantiate the handler for a class
    ///
    /// Returns None, not an error, when the class is unregistered or
    /// disabled by configuration.
    pub fn create(
        &self,
        class: DeviceClass,
        config: &DaemonConfig,
        notifier: Notifier,
    ) -> Option<Box<dyn DeviceHandler>> {
        if !config.enabled(class) {
            info!("device class {} disabled by configuration", class);
            return None;
        }
        let constructor = self.constructors.get(&class)?;
        Some(constructor(config, notifier))
    }

    /// Instantiate every enabled handler in registration order
    pub fn create_all(&self, config: &DaemonConfig, notifier: Notifier) -> Vec<Box<dyn DeviceHandler>> {
        self.order
            .iter()
            .filter_map(|class| self.create(*class, config, notifier.clone()))
            .collect()
    }
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self::new()
    }
}
