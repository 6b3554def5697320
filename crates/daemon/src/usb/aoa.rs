//! Android Open Accessory handshake
//!
//! Switches a connected Android device into accessory mode through an
//! ordered control-transfer sequence: query the protocol version, push the
//! six identity string descriptors, then issue the start command. The device
//! re-enumerates afterwards with accessory-mode identifiers and returns as a
//! plain hotplug add.

use crate::usb::host::{AccessoryPort, UsbHost, UsbHostError};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Google's vendor id, used by devices already in accessory mode
pub const ACCESSORY_VENDOR_ID: u16 = 0x18d1;
/// Product id range a switched device re-enumerates into
const ACCESSORY_PID_FIRST: u16 = 0x2d00;
const ACCESSORY_PID_LAST: u16 = 0x2d05;

/// AOA control requests
const REQUEST_GET_PROTOCOL: u8 = 51;
const REQUEST_SEND_STRING: u8 = 52;
const REQUEST_START: u8 = 53;

/// Vendor request types (bit 7 = direction)
const REQUEST_TYPE_VENDOR_IN: u8 = 0xc0;
const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// Retry bound for opening a freshly announced device: 1 initial attempt
/// plus this many retries
pub const OPEN_RETRY_LIMIT: u32 = 10;
/// Fixed delay between open attempts
pub const OPEN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Whether the identifiers indicate a device already in accessory mode
pub fn in_accessory_mode(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == ACCESSORY_VENDOR_ID
        && (ACCESSORY_PID_FIRST..=ACCESSORY_PID_LAST).contains(&product_id)
}

/// Accessory identity announced during the handshake
///
/// Sent as six null-terminated string descriptors in fixed slot order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryIdentity {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
    pub uri: String,
    pub serial: String,
}

impl Default for AccessoryIdentity {
    fn default() -> Self {
        Self {
            manufacturer: "hotplugd".to_string(),
            model: "hotplugd host".to_string(),
            description: "hotplugd accessory bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uri: "https://github.com/hotplugd/hotplugd".to_string(),
            serial: "0000000000000000".to_string(),
        }
    }
}

impl AccessoryIdentity {
    /// Descriptor strings in the order the protocol requires
    fn strings(&self) -> [(StringSlot, &str); 6] {
        [
            (StringSlot::Manufacturer, self.manufacturer.as_str()),
            (StringSlot::Model, self.model.as_str()),
            (StringSlot::Description, self.description.as_str()),
            (StringSlot::Version, self.version.as_str()),
            (StringSlot::Uri, self.uri.as_str()),
            (StringSlot::Serial, self.serial.as_str()),
        ]
    }
}

/// Fixed string-index slots defined by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringSlot {
    Manufacturer = 0,
    Model = 1,
    Description = 2,
    Version = 3,
    Uri = 4,
    Serial = 5,
}

/// Accessory handshake errors
#[derive(Debug, Error)]
pub enum AoaError {
    /// Open retries exhausted; the device stays unmanaged for this event
    #[error("device open failed after {attempts} attempts: {source}")]
    OpenExhausted {
        attempts: u32,
        #[source]
        source: UsbHostError,
    },

    /// Protocol version reply was not exactly two bytes
    #[error("protocol version query returned {len} bytes, expected 2")]
    ShortVersionReply { len: usize },

    /// A string descriptor transfer wrote fewer bytes than expected
    #[error("descriptor {slot:?} short write: wrote {written}, expected {expected}")]
    ShortStringWrite {
        slot: StringSlot,
        written: usize,
        expected: usize,
    },

    #[error(transparent)]
    Usb(#[from] UsbHostError),
}

/// Open a device handle, retrying on failure up to the fixed bound
///
/// A freshly announced device can take a moment before it accepts an open;
/// the delay between attempts is blocking by design (the handler runs on a
/// single synchronous thread, worst case one second total).
pub fn open_with_retry(
    host: &dyn UsbHost,
    vendor_id: u16,
    product_id: u16,
) -> Result<Box<dyn AccessoryPort>, AoaError> {
    let mut failures = 0u32;
    loop {
        match host.open_device(vendor_id, product_id) {
            Ok(port) => return Ok(port),
            Err(e) => {
                failures += 1;
                if failures > OPEN_RETRY_LIMIT {
                    return Err(AoaError::OpenExhausted {
                        attempts: failures,
                        source: e,
                    });
                }
                debug!(
                    "open attempt {} for {:04x}:{:04x} failed: {}; retrying",
                    failures, vendor_id, product_id, e
                );
                std::thread::sleep(OPEN_RETRY_DELAY);
            }
        }
    }
}

/// Run the full accessory handshake on an open port
///
/// Returns the negotiated protocol version. Any failed step aborts the
/// remaining steps; nothing is retried here.
pub fn run_handshake(
    port: &mut dyn AccessoryPort,
    identity: &AccessoryIdentity,
) -> Result<u16, AoaError> {
    // Claim failure is tolerated: the control transfers below go to the
    // default endpoint and have been observed to succeed regardless.
    if let Err(e) = port.claim_interface(0) {
        warn!("claim of interface 0 failed, continuing handshake: {}", e);
    }

    let version = query_protocol_version(port)?;
    debug!("accessory protocol version {}", version);

    for (slot, text) in identity.strings() {
        send_string(port, slot, text)?;
    }

    start_accessory(port)?;
    Ok(version)
}

fn query_protocol_version(port: &mut dyn AccessoryPort) -> Result<u16, AoaError> {
    let mut buf = [0u8; 2];
    let len = port.read_control(REQUEST_TYPE_VENDOR_IN, REQUEST_GET_PROTOCOL, 0, 0, &mut buf)?;
    if len != 2 {
        return Err(AoaError::ShortVersionReply { len });
    }
    Ok(LittleEndian::read_u16(&buf))
}

fn send_string(port: &mut dyn AccessoryPort, slot: StringSlot, text: &str) -> Result<(), AoaError> {
    let mut data = Vec::with_capacity(text.len() + 1);
    data.extend_from_slice(text.as_bytes());
    data.push(0);

    let written = port.write_control(
        REQUEST_TYPE_VENDOR_OUT,
        REQUEST_SEND_STRING,
        0,
        slot as u16,
        &data,
    )?;
    if written != data.len() {
        return Err(AoaError::ShortStringWrite {
            slot,
            written,
            expected: data.len(),
        });
    }
    Ok(())
}

fn start_accessory(port: &mut dyn AccessoryPort) -> Result<(), AoaError> {
    port.write_control(REQUEST_TYPE_VENDOR_OUT, REQUEST_START, 0, 0, &[])?;
    Ok(())
}
