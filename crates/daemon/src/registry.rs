//! Per-handler device registry
//!
//! Each handler owns exactly one registry. Records are keyed by device path
//! for the duration of one physical attach; a secondary index maps the
//! handler-assigned device number back to the path so external references
//! are always by key, never by pointer.

use event::{DeviceClass, DeviceEvent, DeviceStatus, attr};
use std::collections::HashMap;

/// One attached device
#[derive(Debug, Clone)]
pub struct DeviceRecord<P> {
    /// Stable key within one attach/detach lifetime
    pub device_path: String,
    /// Monotonic number assigned at creation, never reused while live
    pub device_number: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_type: String,
    pub device_sub_type: String,
    pub speed: Option<String>,
    pub product_name: Option<String>,
    pub vendor_name: Option<String>,
    pub serial_number: Option<String>,
    /// true = powered, false = suspended; only power handling mutates this
    pub power_status: bool,
    /// Class-specific payload
    pub payload: P,
}

impl<P> DeviceRecord<P> {
    /// Populate descriptive fields from an event's attributes
    ///
    /// Attributes absent from the event leave the current value in place, so
    /// a sparse refresh does not erase what an earlier ADD provided.
    /// `power_status` is never touched here.
    pub fn apply_event(&mut self, event: &DeviceEvent) {
        if let Ok(vendor_id) = event.vendor_id() {
            self.vendor_id = vendor_id;
        }
        if let Ok(product_id) = event.product_id() {
            self.product_id = product_id;
        }
        if let Some(devtype) = event.devtype() {
            self.device_type = devtype.to_string();
        }
        if let Some(subsystem) = event.subsystem() {
            self.device_sub_type = subsystem.to_string();
        }
        if let Some(speed) = event.get(attr::SPEED) {
            self.speed = Some(speed.to_string());
        }
        if let Some(model) = event.get(attr::ID_MODEL) {
            self.product_name = Some(model.to_string());
        }
        if let Some(vendor) = event.get(attr::ID_VENDOR) {
            self.vendor_name = Some(vendor.to_string());
        }
        if let Some(serial) = event.get(attr::ID_SERIAL) {
            self.serial_number = Some(serial.to_string());
        }
    }

    /// Snapshot the public fields for notification or status reporting
    pub fn status(&self, class: DeviceClass) -> DeviceStatus {
        DeviceStatus {
            class,
            device_number: self.device_number,
            device_path: self.device_path.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            device_type: self.device_type.clone(),
            device_sub_type: self.device_sub_type.clone(),
            speed: self.speed.clone(),
            product_name: self.product_name.clone(),
            vendor_name: self.vendor_name.clone(),
            serial_number: self.serial_number.clone(),
            power_status: self.power_status,
        }
    }
}

/// Registry of device records for one handler
#[derive(Debug)]
pub struct DeviceRegistry<P> {
    records: HashMap<String, DeviceRecord<P>>,
    paths_by_number: HashMap<u32, String>,
    next_number: u32,
}

impl<P> DeviceRegistry<P> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            paths_by_number: HashMap::new(),
            next_number: 1,
        }
    }

    /// Get or create the record for a path
    ///
    /// A second ADD for an existing path returns the existing record for
    /// in-place mutation; the device number is assigned once at creation.
    pub fn upsert_with<F>(&mut self, path: &str, make_payload: F) -> &mut DeviceRecord<P>
    where
        F: FnOnce() -> P,
    {
        if !self.records.contains_key(path) {
            let device_number = self.next_number;
            self.next_number += 1;

            self.paths_by_number.insert(device_number, path.to_string());
            self.records.insert(
                path.to_string(),
                DeviceRecord {
                    device_path: path.to_string(),
                    device_number,
                    vendor_id: 0,
                    product_id: 0,
                    device_type: String::new(),
                    device_sub_type: String::new(),
                    speed: None,
                    product_name: None,
                    vendor_name: None,
                    serial_number: None,
                    power_status: true,
                    payload: make_payload(),
                },
            );
        }

        self.records.get_mut(path).expect("record inserted above")
    }

    pub fn get(&self, path: &str) -> Option<&DeviceRecord<P>> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut DeviceRecord<P>> {
        self.records.get_mut(path)
    }

    pub fn by_number(&self, device_number: u32) -> Option<&DeviceRecord<P>> {
        let path = self.paths_by_number.get(&device_number)?;
        self.records.get(path)
    }

    pub fn by_number_mut(&mut self, device_number: u32) -> Option<&mut DeviceRecord<P>> {
        let path = self.paths_by_number.get(&device_number)?;
        self.records.get_mut(path)
    }

    /// Remove and return the record for a path, if present
    pub fn remove(&mut self, path: &str) -> Option<DeviceRecord<P>> {
        let record = self.records.remove(path)?;
        self.paths_by_number.remove(&record.device_number);
        Some(record)
    }

    /// Remove and return the record with a device number, if present
    pub fn remove_by_number(&mut self, device_number: u32) -> Option<DeviceRecord<P>> {
        let path = self.paths_by_number.get(&device_number)?.clone();
        self.remove(&path)
    }

    /// Drain every record for handler teardown
    pub fn drain_all(&mut self) -> Vec<DeviceRecord<P>> {
        self.paths_by_number.clear();
        let mut drained: Vec<DeviceRecord<P>> = self.records.drain().map(|(_, r)| r).collect();
        drained.sort_by_key(|r| r.device_number);
        drained
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord<P>> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceRecord<P>> {
        self.records.values_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<P> Default for DeviceRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::usb_add_event;

    #[test]
    fn test_upsert_assigns_monotonic_numbers() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();

        let first = registry.upsert_with("/devices/usb1/1-1", || ()).device_number;
        let second = registry.upsert_with("/devices/usb1/1-2", || ()).device_number;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_upsert_same_path_keeps_record() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();

        let number = registry.upsert_with("/devices/usb1/1-1", || ()).device_number;
        let again = registry.upsert_with("/devices/usb1/1-1", || ()).device_number;

        assert_eq!(number, again);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_numbers_not_reused_while_live() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();

        registry.upsert_with("/d1", || ());
        registry.remove("/d1").unwrap();
        let next = registry.upsert_with("/d1", || ()).device_number;

        // The path came back, the number did not.
        assert_eq!(next, 2);
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();
        assert!(registry.remove("/devices/unknown").is_none());
        assert!(registry.remove_by_number(7).is_none());
    }

    #[test]
    fn test_number_index_follows_removal() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();

        let number = registry.upsert_with("/d1", || ()).device_number;
        assert!(registry.by_number(number).is_some());

        registry.remove("/d1").unwrap();
        assert!(registry.by_number(number).is_none());
    }

    #[test]
    fn test_apply_event_populates_fields() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();
        let event = usb_add_event("/devices/usb1/1-1", "18d1", "4ee2", "ff");

        let record = registry.upsert_with("/devices/usb1/1-1", || ());
        record.apply_event(&event);

        assert_eq!(record.vendor_id, 0x18d1);
        assert_eq!(record.product_id, 0x4ee2);
        assert_eq!(record.device_type, "usb_device");
        assert_eq!(record.device_sub_type, "usb");
        assert_eq!(record.product_name.as_deref(), Some("TestModel"));
        assert_eq!(record.serial_number.as_deref(), Some("SN0001"));
        assert!(record.power_status);
    }

    #[test]
    fn test_sparse_refresh_keeps_earlier_fields() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();
        let full = usb_add_event("/d1", "18d1", "4ee2", "ff");
        let sparse = event::DeviceEvent::from_pairs(&[
            (event::attr::ACTION, "change"),
            (event::attr::DEVPATH, "/d1"),
            (event::attr::ID_MODEL, "RenamedModel"),
        ]);

        let record = registry.upsert_with("/d1", || ());
        record.apply_event(&full);
        record.apply_event(&sparse);

        assert_eq!(record.product_name.as_deref(), Some("RenamedModel"));
        assert_eq!(record.vendor_id, 0x18d1);
        assert_eq!(record.serial_number.as_deref(), Some("SN0001"));
    }

    #[test]
    fn test_drain_all_empties_registry() {
        let mut registry: DeviceRegistry<()> = DeviceRegistry::new();
        registry.upsert_with("/d1", || ());
        registry.upsert_with("/d2", || ());

        let drained = registry.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.by_number(1).is_none());
    }
}
