use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

/// Power state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_ready(self) -> bool {
        self == AdapterState::PoweredOn
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            AdapterState::Unknown => "unknown",
            AdapterState::Resetting => "resetting",
            AdapterState::Unsupported => "unsupported",
            AdapterState::Unauthorized => "unauthorized",
            AdapterState::PoweredOff => "poweredOff",
            AdapterState::PoweredOn => "poweredOn",
        };
        write!(f, "{}", state)
    }
}

/// A GATT service found on a connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceInfo {
    pub uuid: Uuid,
}

/// A GATT characteristic found on a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
}

/// Whether the device must acknowledge a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteMode {
    WithResponse,
    #[default]
    WithoutResponse,
}

/// Something the adapter reported while listening.
#[derive(Debug, Clone)]
pub enum TransportEvent<P> {
    /// An advertisement was received.
    Discovered(P),
    /// The device with this address dropped its connection.
    Disconnected(String),
}

pub type EventStream<P> = BoxStream<'static, TransportEvent<P>>;

/// The local radio: adapter state, scanning and the advertisement feed.
///
/// The event stream is shared by everyone listening on the adapter, so
/// consumers filter it themselves. Whether two scans may run at once is up to
/// the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    type Peripheral: Peripheral;

    async fn adapter_state(&self) -> Result<AdapterState, TransportError>;

    /// Subscribes to adapter events. Dropping the stream unsubscribes.
    async fn events(&self) -> Result<EventStream<Self::Peripheral>, TransportError>;

    async fn start_scan(&self) -> Result<(), TransportError>;

    async fn stop_scan(&self) -> Result<(), TransportError>;
}

/// A remote device seen in an advertisement.
#[async_trait]
pub trait Peripheral: Clone + Send + Sync + 'static {
    fn address(&self) -> String;

    fn local_name(&self) -> Option<String>;

    fn rssi(&self) -> Option<i16> {
        None
    }

    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn is_connected(&self) -> Result<bool, TransportError>;

    /// Lists services, restricted to `allowlist` when the backend supports it.
    async fn discover_services(
        &self,
        allowlist: &[Uuid],
    ) -> Result<Vec<ServiceInfo>, TransportError>;

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        allowlist: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, TransportError>;

    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError>;
}
