//! The real radio, through `btleplug`.

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _,
    PeripheralProperties, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info};
use uuid::Uuid;

use crate::error::TransportError;
use crate::util::traits::{
    self, AdapterState, CharacteristicInfo, EventStream, ServiceInfo, Transport, TransportEvent,
    WriteMode,
};

/// Renders an address the way it is usually written down for these bulbs,
/// lowercase colon-separated hex.
fn format_address(address: BDAddr) -> String {
    address.to_string().to_lowercase()
}

/// A `btleplug` adapter.
#[derive(Debug, Clone)]
pub struct BtleTransport {
    adapter: Adapter,
}

impl BtleTransport {
    /// Uses the first Bluetooth adapter of the system.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        info!("Using Bluetooth adapter {}", adapter.adapter_info().await?);
        Ok(BtleTransport { adapter })
    }

    pub fn with_adapter(adapter: Adapter) -> Self {
        BtleTransport { adapter }
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Peripheral = BtlePeripheral;

    async fn adapter_state(&self) -> Result<AdapterState, TransportError> {
        let state = match self.adapter.adapter_state().await? {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        };
        Ok(state)
    }

    async fn events(&self) -> Result<EventStream<BtlePeripheral>, TransportError> {
        let adapter = self.adapter.clone();
        let events = self.adapter.events().await?;
        Ok(events
            .filter_map(move |event| {
                let adapter = adapter.clone();
                async move {
                    match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                            let peripheral = adapter.peripheral(&id).await.ok()?;
                            let properties = peripheral.properties().await.ok().flatten();
                            Some(TransportEvent::Discovered(BtlePeripheral::new(
                                peripheral, properties,
                            )))
                        }
                        CentralEvent::DeviceDisconnected(id) => {
                            let peripheral = adapter.peripheral(&id).await.ok()?;
                            Some(TransportEvent::Disconnected(format_address(
                                peripheral.address(),
                            )))
                        }
                        _ => None,
                    }
                }
            })
            .boxed())
    }

    async fn start_scan(&self) -> Result<(), TransportError> {
        debug!("Starting scan");
        Ok(self.adapter.start_scan(ScanFilter::default()).await?)
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        debug!("Stopping scan");
        Ok(self.adapter.stop_scan().await?)
    }
}

/// A device reported by `btleplug`, with the name and signal strength of the
/// advertisement that produced it.
#[derive(Debug, Clone)]
pub struct BtlePeripheral {
    inner: Peripheral,
    name: Option<String>,
    rssi: Option<i16>,
}

impl BtlePeripheral {
    fn new(inner: Peripheral, properties: Option<PeripheralProperties>) -> Self {
        let (name, rssi) = match properties {
            Some(properties) => (properties.local_name, properties.rssi),
            None => (None, None),
        };
        BtlePeripheral { inner, name, rssi }
    }

    fn allowed(allowlist: &[Uuid], uuid: &Uuid) -> bool {
        allowlist.is_empty() || allowlist.contains(uuid)
    }
}

#[async_trait]
impl traits::Peripheral for BtlePeripheral {
    fn address(&self) -> String {
        format_address(self.inner.address())
    }

    fn local_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    async fn connect(&self) -> Result<(), TransportError> {
        Ok(self.inner.connect().await?)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(self.inner.disconnect().await?)
    }

    async fn is_connected(&self) -> Result<bool, TransportError> {
        Ok(self.inner.is_connected().await?)
    }

    // btleplug always discovers the whole GATT table; the allow-list is
    // applied to the result.
    async fn discover_services(
        &self,
        allowlist: &[Uuid],
    ) -> Result<Vec<ServiceInfo>, TransportError> {
        self.inner.discover_services().await?;
        Ok(self
            .inner
            .services()
            .into_iter()
            .filter(|service| Self::allowed(allowlist, &service.uuid))
            .map(|service| ServiceInfo { uuid: service.uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        allowlist: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        Ok(self
            .inner
            .services()
            .into_iter()
            .filter(|candidate| candidate.uuid == service.uuid)
            .flat_map(|candidate| candidate.characteristics.into_iter())
            .filter(|characteristic| Self::allowed(allowlist, &characteristic.uuid))
            .map(|characteristic| CharacteristicInfo {
                uuid: characteristic.uuid,
                service_uuid: characteristic.service_uuid,
            })
            .collect())
    }

    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        let target = self
            .inner
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service_uuid)
            .ok_or(TransportError::UnknownCharacteristic(characteristic.uuid))?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        Ok(self.inner.write(&target, data, write_type).await?)
    }
}
