//! Device class tags and status snapshots

use serde::{Deserialize, Serialize};

/// Device class owning a handler and its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// USB devices, including accessory-mode candidates
    Usb,
    /// Bluetooth adapters and rfkill radio state
    Bluetooth,
    /// Block storage devices and their partitions
    Storage,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Usb => "usb",
            DeviceClass::Bluetooth => "bluetooth",
            DeviceClass::Storage => "storage",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle action tag delivered to notification subscribers
///
/// A refresh of an already-attached device is delivered as `Add` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    Add,
    Remove,
}

/// Read-only projection of one device record's public fields
///
/// Built on demand for status queries and notifications; never a live
/// reference into a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Owning device class
    pub class: DeviceClass,
    /// Handler-assigned monotonic number, unique among live records
    pub device_number: u32,
    /// Stable path for this attach lifetime
    pub device_path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_type: String,
    pub device_sub_type: String,
    pub speed: Option<String>,
    pub product_name: Option<String>,
    pub vendor_name: Option<String>,
    pub serial_number: Option<String>,
    /// true = powered, false = suspended
    pub power_status: bool,
}
