use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::message::Message;

/// Errors raised while opening or driving a bulb.
///
/// Every step of a session maps to its own variant, so callers can tell an
/// adapter that never powered on apart from a bulb that was simply out of range.
#[derive(Error, Debug)]
pub enum Error {
    /// The local adapter never reported `PoweredOn`.
    #[error("Bluetooth adapter did not power on after {attempts} polls")]
    AdapterTimeout { attempts: u32 },

    /// The scan window elapsed without seeing the target address.
    #[error("Device {address} not found within {timeout:?}")]
    DeviceNotFound { address: String, timeout: Duration },

    /// The device was found but the connection attempt failed.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },

    /// None of the services on the device is in the allow-list.
    #[error("No supported service found on device {address}")]
    NoSupportedService { address: String },

    /// The selected service exposes none of the allow-listed characteristics.
    #[error("No supported characteristic found on service {service}")]
    NoSupportedCharacteristic { service: Uuid },

    /// Writing a command to the bulb failed.
    #[error("Failed to write command: {source}")]
    Write {
        #[source]
        source: TransportError,
    },

    /// A command template was filled with too few parameters.
    #[error("{kind:?} needs {expected} parameters, got {supplied}")]
    EncodingArity {
        kind: Message,
        expected: usize,
        supplied: usize,
    },

    /// Scan, discovery or adapter query failed in the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures reported by a transport backend.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No Bluetooth adapter is present on this machine.
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    /// The characteristic is not (or no longer) known to the device.
    #[error("Characteristic {0} is not available on the device")]
    UnknownCharacteristic(Uuid),

    /// The backend refused the operation.
    #[error("{0}")]
    Rejected(String),

    #[cfg(feature = "btleplug")]
    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
