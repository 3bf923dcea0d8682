use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::traits::WriteMode;

/// Expands a 16-bit Bluetooth SIG short UUID onto the base UUID.
pub const fn short_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

/// Services known to carry the bulb command characteristic.
pub const SUPPORTED_SERVICE_UUIDS: [Uuid; 2] = [short_uuid(0xffd5), short_uuid(0xffe5)];

/// Characteristics accepting command frames.
pub const SUPPORTED_CHARACTERISTIC_UUIDS: [Uuid; 2] = [short_uuid(0xffd9), short_uuid(0xffe9)];

/// How long a session scans for its bulb.
pub const DEFAULT_LOCATE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings for opening a bulb.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```yaml
/// locate_timeout_ms: 10000
/// acknowledged_writes: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Scan window for finding the target address.
    pub locate_timeout_ms: u64,
    /// Delay between adapter state polls.
    pub ready_poll_interval_ms: u64,
    /// Polls allowed before giving up on the adapter.
    pub ready_poll_attempts: u32,
    /// Ask the bulb to acknowledge every command.
    pub acknowledged_writes: bool,
    pub service_uuids: Vec<Uuid>,
    pub characteristic_uuids: Vec<Uuid>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            locate_timeout_ms: DEFAULT_LOCATE_TIMEOUT.as_millis() as u64,
            ready_poll_interval_ms: 100,
            ready_poll_attempts: 30,
            acknowledged_writes: false,
            service_uuids: SUPPORTED_SERVICE_UUIDS.to_vec(),
            characteristic_uuids: SUPPORTED_CHARACTERISTIC_UUIDS.to_vec(),
        }
    }
}

impl SessionConfig {
    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn write_mode(&self) -> WriteMode {
        if self.acknowledged_writes {
            WriteMode::WithResponse
        } else {
            WriteMode::WithoutResponse
        }
    }

    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_acknowledged_writes(mut self, acknowledged: bool) -> Self {
        self.acknowledged_writes = acknowledged;
        self
    }
}
