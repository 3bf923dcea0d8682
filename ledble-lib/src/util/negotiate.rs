use log::info;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::util::traits::{CharacteristicInfo, Peripheral};

/// Finds the characteristic that accepts command frames on a connected device.
///
/// Walks service discovery, then characteristic discovery on the first
/// allow-listed service, and returns the first allow-listed characteristic.
/// Results are matched against the allow-lists here as well, since not every
/// backend honours the discovery filter.
pub async fn negotiate<P: Peripheral>(
    device: &P,
    config: &SessionConfig,
) -> Result<CharacteristicInfo> {
    let services = device.discover_services(&config.service_uuids).await?;
    let service = services
        .into_iter()
        .find(|service| config.service_uuids.contains(&service.uuid))
        .ok_or_else(|| Error::NoSupportedService {
            address: device.address(),
        })?;
    info!("Got service {}", service.uuid);

    let characteristics = device
        .discover_characteristics(&service, &config.characteristic_uuids)
        .await?;
    let characteristic = characteristics
        .into_iter()
        .find(|characteristic| config.characteristic_uuids.contains(&characteristic.uuid))
        .ok_or(Error::NoSupportedCharacteristic {
            service: service.uuid,
        })?;
    info!("Got characteristic {}", characteristic.uuid);

    Ok(characteristic)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::{short_uuid, SUPPORTED_CHARACTERISTIC_UUIDS, SUPPORTED_SERVICE_UUIDS};
    use crate::util::simulator::{SimulatedBulb, SimulatedPeripheral, SimulatedTransport};
    use crate::util::traits::{Transport, TransportEvent};

    const HEART_RATE: Uuid = short_uuid(0x180d);

    async fn connected(bulb: SimulatedBulb) -> SimulatedPeripheral {
        let transport = SimulatedTransport::new().with_bulb(bulb);
        let mut events = transport.events().await.unwrap();
        match events.next().await {
            Some(TransportEvent::Discovered(device)) => {
                device.connect().await.unwrap();
                device
            }
            other => panic!("expected an advertisement, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_picks_allow_listed_service_over_discovery_order() {
        let device = connected(SimulatedBulb::new("aa:bb:cc:dd:ee:01").with_services(vec![
            (HEART_RATE, vec![short_uuid(0x2a37)]),
            (SUPPORTED_SERVICE_UUIDS[1], vec![SUPPORTED_CHARACTERISTIC_UUIDS[1]]),
        ]))
        .await;

        let characteristic = negotiate(&device, &SessionConfig::default()).await.unwrap();
        assert_eq!(characteristic.service_uuid, SUPPORTED_SERVICE_UUIDS[1]);
        assert_eq!(characteristic.uuid, SUPPORTED_CHARACTERISTIC_UUIDS[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_wins() {
        let device = connected(SimulatedBulb::new("aa:bb:cc:dd:ee:02").with_services(vec![
            (
                SUPPORTED_SERVICE_UUIDS[1],
                vec![SUPPORTED_CHARACTERISTIC_UUIDS[1], SUPPORTED_CHARACTERISTIC_UUIDS[0]],
            ),
            (SUPPORTED_SERVICE_UUIDS[0], vec![SUPPORTED_CHARACTERISTIC_UUIDS[0]]),
        ]))
        .await;

        let characteristic = negotiate(&device, &SessionConfig::default()).await.unwrap();
        assert_eq!(characteristic.service_uuid, SUPPORTED_SERVICE_UUIDS[1]);
        assert_eq!(characteristic.uuid, SUPPORTED_CHARACTERISTIC_UUIDS[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_supported_service() {
        let device = connected(
            SimulatedBulb::new("aa:bb:cc:dd:ee:03")
                .with_services(vec![(HEART_RATE, vec![short_uuid(0x2a37)])]),
        )
        .await;

        let result = negotiate(&device, &SessionConfig::default()).await;
        match result {
            Err(Error::NoSupportedService { address }) => assert_eq!(address, "aa:bb:cc:dd:ee:03"),
            other => panic!("expected NoSupportedService, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_supported_characteristic() {
        let device = connected(
            SimulatedBulb::new("aa:bb:cc:dd:ee:04")
                .with_services(vec![(SUPPORTED_SERVICE_UUIDS[0], vec![short_uuid(0xffda)])]),
        )
        .await;

        let result = negotiate(&device, &SessionConfig::default()).await;
        assert!(matches!(
            result,
            Err(Error::NoSupportedCharacteristic { service }) if service == SUPPORTED_SERVICE_UUIDS[0]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_error_is_a_transport_error() {
        let transport = SimulatedTransport::new().with_bulb(SimulatedBulb::new("aa:bb:cc:dd:ee:05"));
        let mut events = transport.events().await.unwrap();
        let Some(TransportEvent::Discovered(device)) = events.next().await else {
            panic!("expected an advertisement");
        };
        // never connected
        let result = negotiate(&device, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
