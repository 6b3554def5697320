//! Shared test helpers
//!
//! Canned device events and status snapshots used by the daemon's unit and
//! integration tests.

use event::{DeviceClass, DeviceEvent, DeviceStatus, attr};

/// Build an event from borrowed pairs
pub fn make_event(pairs: &[(&str, &str)]) -> DeviceEvent {
    DeviceEvent::from_pairs(pairs)
}

/// ADD event for a standalone USB device
pub fn usb_add_event(path: &str, vendor_id: &str, product_id: &str, interface_class: &str) -> DeviceEvent {
    make_event(&[
        (attr::ACTION, "add"),
        (attr::DEVPATH, path),
        (attr::SUBSYSTEM, "usb"),
        (attr::DEVTYPE, "usb_device"),
        (attr::ID_VENDOR_ID, vendor_id),
        (attr::ID_PRODUCT_ID, product_id),
        (attr::INTERFACE_CLASS, interface_class),
        (attr::ID_VENDOR, "TestVendor"),
        (attr::ID_MODEL, "TestModel"),
        (attr::ID_SERIAL, "SN0001"),
        (attr::SPEED, "480"),
    ])
}

/// ADD event for a Bluetooth adapter
pub fn bluetooth_add_event(path: &str, name: &str) -> DeviceEvent {
    make_event(&[
        (attr::ACTION, "add"),
        (attr::DEVPATH, path),
        (attr::SUBSYSTEM, "bluetooth"),
        (attr::NAME, name),
    ])
}

/// ADD event for a block disk device
pub fn storage_add_event(path: &str, vendor_id: &str, product_id: &str) -> DeviceEvent {
    make_event(&[
        (attr::ACTION, "add"),
        (attr::DEVPATH, path),
        (attr::SUBSYSTEM, "block"),
        (attr::DEVTYPE, "disk"),
        (attr::ID_VENDOR_ID, vendor_id),
        (attr::ID_PRODUCT_ID, product_id),
        (attr::ID_MODEL, "FlashDrive"),
    ])
}

/// REMOVE event for any subsystem
pub fn remove_event(subsystem: &str, path: &str) -> DeviceEvent {
    make_event(&[
        (attr::ACTION, "remove"),
        (attr::DEVPATH, path),
        (attr::SUBSYSTEM, subsystem),
    ])
}

/// Minimal status snapshot for channel and subscriber tests
pub fn sample_status(class: DeviceClass, device_number: u32, path: &str) -> DeviceStatus {
    DeviceStatus {
        class,
        device_number,
        device_path: path.to_string(),
        vendor_id: 0x18d1,
        product_id: 0x4ee2,
        device_type: "usb_device".to_string(),
        device_sub_type: "usb".to_string(),
        speed: Some("480".to_string()),
        product_name: Some("TestModel".to_string()),
        vendor_name: Some("TestVendor".to_string()),
        serial_number: Some("SN0001".to_string()),
        power_status: true,
    }
}
