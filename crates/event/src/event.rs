//! Normalized device event carrier
//!
//! A [`DeviceEvent`] is an ordered attribute map describing one kernel-level
//! device transition. The external transport decodes the raw uevent into
//! this form; handlers only ever read it.

use crate::error::{EventError, Result};

/// Well-known event attribute names
pub mod attr {
    pub const ACTION: &str = "ACTION";
    pub const DEVPATH: &str = "DEVPATH";
    pub const SUBSYSTEM: &str = "SUBSYSTEM";
    pub const DEVTYPE: &str = "DEVTYPE";
    pub const ID_VENDOR_ID: &str = "ID_VENDOR_ID";
    pub const ID_PRODUCT_ID: &str = "ID_PRODUCT_ID";
    pub const ID_VENDOR: &str = "ID_VENDOR";
    pub const ID_MODEL: &str = "ID_MODEL";
    pub const ID_SERIAL: &str = "ID_SERIAL_SHORT";
    pub const INTERFACE_CLASS: &str = "ID_USB_INTERFACE_CLASS";
    pub const SPEED: &str = "SPEED";
    pub const NAME: &str = "NAME";
}

/// Lifecycle action carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Device attached (or re-announced)
    Add,
    /// Attribute change on an attached device, treated as a refresh
    Change,
    /// Device detached
    Remove,
}

impl EventAction {
    /// Parse the ACTION attribute value
    ///
    /// Anything outside the known set is a classified error so that a bad
    /// action never aborts processing for the remaining handlers.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "add" => Ok(EventAction::Add),
            "change" => Ok(EventAction::Change),
            "remove" => Ok(EventAction::Remove),
            other => Err(EventError::UnknownAction(other.to_string())),
        }
    }
}

/// Normalized device event
///
/// Immutable once constructed. Attribute order is preserved from the
/// transport; lookups return the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    attributes: Vec<(String, String)>,
}

impl DeviceEvent {
    /// Create an event from an ordered attribute list
    pub fn new(attributes: Vec<(String, String)>) -> Self {
        Self { attributes }
    }

    /// Create an event from borrowed pairs (convenient for tests and feeds)
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Look up an attribute value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all attributes in transport order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse the lifecycle action
    pub fn action(&self) -> Result<EventAction> {
        let value = self
            .get(attr::ACTION)
            .ok_or(EventError::MissingAttribute(attr::ACTION))?;
        EventAction::parse(value)
    }

    /// Stable device path, the registry key for one attach lifetime
    pub fn device_path(&self) -> Option<&str> {
        self.get(attr::DEVPATH)
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.get(attr::SUBSYSTEM)
    }

    pub fn devtype(&self) -> Option<&str> {
        self.get(attr::DEVTYPE)
    }

    /// Vendor id parsed from base-16
    pub fn vendor_id(&self) -> Result<u16> {
        self.parse_hex_u16(attr::ID_VENDOR_ID)
    }

    /// Product id parsed from base-16
    pub fn product_id(&self) -> Result<u16> {
        self.parse_hex_u16(attr::ID_PRODUCT_ID)
    }

    /// USB interface class byte parsed from base-16
    pub fn interface_class(&self) -> Result<u8> {
        let value = self
            .get(attr::INTERFACE_CLASS)
            .ok_or(EventError::MissingAttribute(attr::INTERFACE_CLASS))?;
        u8::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|_| {
            EventError::InvalidHex {
                attribute: attr::INTERFACE_CLASS,
                value: value.to_string(),
            }
        })
    }

    fn parse_hex_u16(&self, attribute: &'static str) -> Result<u16> {
        let value = self
            .get(attribute)
            .ok_or(EventError::MissingAttribute(attribute))?;
        u16::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|_| {
            EventError::InvalidHex {
                attribute,
                value: value.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(EventAction::parse("add").unwrap(), EventAction::Add);
        assert_eq!(EventAction::parse("change").unwrap(), EventAction::Change);
        assert_eq!(EventAction::parse("remove").unwrap(), EventAction::Remove);

        let err = EventAction::parse("bind").unwrap_err();
        assert_eq!(err, EventError::UnknownAction("bind".to_string()));
    }

    #[test]
    fn test_attribute_lookup() {
        let event = DeviceEvent::from_pairs(&[
            (attr::ACTION, "add"),
            (attr::DEVPATH, "/devices/usb1/1-1"),
            (attr::SUBSYSTEM, "usb"),
        ]);

        assert_eq!(event.action().unwrap(), EventAction::Add);
        assert_eq!(event.device_path(), Some("/devices/usb1/1-1"));
        assert_eq!(event.subsystem(), Some("usb"));
        assert_eq!(event.get("MISSING"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let event = DeviceEvent::from_pairs(&[
            (attr::NAME, "hci0"),
            (attr::NAME, "hci1"),
        ]);
        assert_eq!(event.get(attr::NAME), Some("hci0"));
    }

    #[test]
    fn test_hex_parsing() {
        let event = DeviceEvent::from_pairs(&[
            (attr::ID_VENDOR_ID, "18d1"),
            (attr::ID_PRODUCT_ID, "0x2d01"),
            (attr::INTERFACE_CLASS, "ff"),
        ]);

        assert_eq!(event.vendor_id().unwrap(), 0x18d1);
        assert_eq!(event.product_id().unwrap(), 0x2d01);
        assert_eq!(event.interface_class().unwrap(), 0xff);
    }

    #[test]
    fn test_hex_parse_failures() {
        let event = DeviceEvent::from_pairs(&[(attr::ID_VENDOR_ID, "not-hex")]);

        assert!(matches!(
            event.vendor_id(),
            Err(EventError::InvalidHex { .. })
        ));
        assert_eq!(
            event.product_id(),
            Err(EventError::MissingAttribute(attr::ID_PRODUCT_ID))
        );
    }
}
