//! Event decoding error types

use thiserror::Error;

/// Errors raised while reading attributes off a device event
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// Action string outside the known add/change/remove set
    #[error("unknown device action: {0:?}")]
    UnknownAction(String),

    /// A required attribute was not present on the event
    #[error("missing event attribute: {0}")]
    MissingAttribute(&'static str),

    /// An attribute did not parse as a base-16 identifier
    #[error("invalid hex value for {attribute}: {value:?}")]
    InvalidHex {
        attribute: &'static str,
        value: String,
    },
}

/// Type alias for event decoding results
pub type Result<T> = std::result::Result<T, EventError>;
