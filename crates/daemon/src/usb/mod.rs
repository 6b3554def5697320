//! USB host access and the accessory-mode protocol engine

pub mod aoa;
pub mod host;

pub use aoa::{AccessoryIdentity, AoaError, in_accessory_mode, open_with_retry, run_handshake};
pub use host::{AccessoryPort, RusbHostProvider, UsbHost, UsbHostError, UsbHostProvider};
