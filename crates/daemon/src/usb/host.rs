//! USB host abstraction over rusb
//!
//! The handler and the accessory engine talk to these traits rather than to
//! rusb directly, so protocol tests can run against mock ports. The rusb
//! implementations execute synchronous control transfers with a fixed
//! timeout and map libusb errors to a typed enum.

use rusb::UsbContext;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Timeout applied to every blocking control transfer
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(3000);

/// USB host-side errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsbHostError {
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("transfer timed out")]
    Timeout,

    #[error("endpoint stalled")]
    Pipe,

    #[error("device was disconnected")]
    NoDevice,

    #[error("device is busy")]
    Busy,

    #[error("access denied")]
    Access,

    #[error("I/O error")]
    Io,

    #[error("USB error: {0}")]
    Other(String),
}

/// Map rusb::Error to UsbHostError
pub fn map_usb_error(err: rusb::Error) -> UsbHostError {
    match err {
        rusb::Error::Timeout => UsbHostError::Timeout,
        rusb::Error::Pipe => UsbHostError::Pipe,
        rusb::Error::NoDevice => UsbHostError::NoDevice,
        rusb::Error::Busy => UsbHostError::Busy,
        rusb::Error::Access => UsbHostError::Access,
        rusb::Error::Io => UsbHostError::Io,
        _ => UsbHostError::Other(err.to_string()),
    }
}

/// Open handle to one USB device, capable of control transfers
pub trait AccessoryPort {
    /// Claim an interface for the duration of the handshake
    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbHostError>;

    /// Synchronous IN control transfer; returns the number of bytes read
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbHostError>;

    /// Synchronous OUT control transfer; returns the number of bytes written
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbHostError>;
}

impl std::fmt::Debug for dyn AccessoryPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn AccessoryPort")
    }
}

/// Process-wide USB context, shared by every accessory-capable device
pub trait UsbHost: Send + Sync {
    /// Open the device with the given identifiers
    fn open_device(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Box<dyn AccessoryPort>, UsbHostError>;
}

/// Creates the shared USB context on first need
///
/// The handler holds the returned [`UsbHost`] only while its registry is
/// occupied; dropping the last Arc tears the context down.
pub trait UsbHostProvider: Send {
    fn acquire(&self) -> Result<Arc<dyn UsbHost>, UsbHostError>;
}

/// rusb-backed USB host
pub struct RusbHost {
    context: rusb::Context,
}

impl RusbHost {
    pub fn new(context: rusb::Context) -> Self {
        Self { context }
    }
}

impl UsbHost for RusbHost {
    fn open_device(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Box<dyn AccessoryPort>, UsbHostError> {
        let handle = self
            .context
            .open_device_with_vid_pid(vendor_id, product_id)
            .ok_or(UsbHostError::DeviceNotFound {
                vendor_id,
                product_id,
            })?;

        debug!("opened device {:04x}:{:04x}", vendor_id, product_id);
        Ok(Box::new(RusbPort { handle }))
    }
}

/// rusb-backed port
pub struct RusbPort {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl AccessoryPort for RusbPort {
    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbHostError> {
        self.handle.claim_interface(interface).map_err(map_usb_error)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, UsbHostError> {
        self.handle
            .read_control(request_type, request, value, index, buf, TRANSFER_TIMEOUT)
            .map_err(map_usb_error)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, UsbHostError> {
        self.handle
            .write_control(request_type, request, value, index, data, TRANSFER_TIMEOUT)
            .map_err(map_usb_error)
    }
}

/// Default provider creating a fresh rusb context
pub struct RusbHostProvider;

impl UsbHostProvider for RusbHostProvider {
    fn acquire(&self) -> Result<Arc<dyn UsbHost>, UsbHostError> {
        let context = rusb::Context::new().map_err(map_usb_error)?;
        debug!("USB context created");
        Ok(Arc::new(RusbHost::new(context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_usb_error() {
        assert_eq!(map_usb_error(rusb::Error::Timeout), UsbHostError::Timeout);
        assert_eq!(map_usb_error(rusb::Error::Pipe), UsbHostError::Pipe);
        assert_eq!(map_usb_error(rusb::Error::NoDevice), UsbHostError::NoDevice);
        assert_eq!(map_usb_error(rusb::Error::Access), UsbHostError::Access);
    }

    #[test]
    fn test_transfer_timeout_bound() {
        assert_eq!(TRANSFER_TIMEOUT, Duration::from_millis(3000));
    }
}
