use std::cmp::max;
use std::collections::HashSet;
use std::time::Duration;

use derivative::Derivative;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::timeout;

use crate::config::SessionConfig;
use crate::error::{Error, Result, TransportError};
use crate::util::negotiate::negotiate;
use crate::util::traits::{CharacteristicInfo, EventStream, Peripheral, Transport, TransportEvent};

/// A device seen while listing nearby bulbs.
///
/// Two identifiers are equal when their addresses are; the name and signal
/// strength of later advertisements do not make a new device.
#[derive(Derivative)]
#[derivative(Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Debug, Clone, Serialize)]
pub struct DeviceIdentifier {
    pub address: String,
    #[derivative(Hash = "ignore", PartialEq = "ignore", PartialOrd = "ignore", Ord = "ignore")]
    pub name: Option<String>,
    #[derivative(Hash = "ignore", PartialEq = "ignore", PartialOrd = "ignore", Ord = "ignore")]
    pub rssi: Option<i16>,
}

impl DeviceIdentifier {
    pub fn new(address: String, name: Option<String>, rssi: Option<i16>) -> Self {
        DeviceIdentifier {
            address,
            name,
            rssi,
        }
    }

    fn from_peripheral<P: Peripheral>(peripheral: &P) -> Self {
        DeviceIdentifier::new(peripheral.address(), peripheral.local_name(), peripheral.rssi())
    }
}

/// A connected device together with its command characteristic.
#[derive(Debug, Clone)]
pub struct Located<P> {
    pub device: P,
    pub characteristic: CharacteristicInfo,
}

pub struct Discovery;

impl Discovery {
    /// Scans for `address`, connects to it and negotiates its command
    /// characteristic.
    ///
    /// The scan is stopped as soon as the address shows up, or when
    /// `config.locate_timeout()` runs out first, in which case the call fails
    /// with [`Error::DeviceNotFound`]. The timeout only covers the scan;
    /// connecting and discovery run to completion once the device is found.
    pub async fn locate<T: Transport + ?Sized>(
        transport: &T,
        address: &str,
        config: &SessionConfig,
    ) -> Result<Located<T::Peripheral>> {
        let device = Self::scan_for(transport, address, config.locate_timeout()).await?;

        info!("Got device {}, connecting", address);
        device.connect().await.map_err(|source| Error::Connect {
            address: address.to_string(),
            source,
        })?;
        info!("Connected to {}, discovering services", address);

        let characteristic = negotiate(&device, config).await?;
        Ok(Located {
            device,
            characteristic,
        })
    }

    async fn scan_for<T: Transport + ?Sized>(
        transport: &T,
        address: &str,
        given_timeout: Duration,
    ) -> Result<T::Peripheral> {
        let mut events = transport.events().await?;
        transport.start_scan().await?;

        let found = timeout(given_timeout, Self::wait_for(&mut events, address)).await;
        // Stop listening before the scan stops, so nothing queued behind the
        // match is looked at.
        drop(events);
        if let Err(e) = transport.stop_scan().await {
            warn!("Failed to stop scanning: {}", e);
        }

        match found {
            Ok(Some(device)) => Ok(device),
            Ok(None) => Err(Error::Transport(TransportError::Rejected(
                "event stream closed".to_string(),
            ))),
            Err(_) => Err(Error::DeviceNotFound {
                address: address.to_string(),
                timeout: given_timeout,
            }),
        }
    }

    async fn wait_for<P: Peripheral>(events: &mut EventStream<P>, address: &str) -> Option<P> {
        while let Some(event) = events.next().await {
            match event {
                TransportEvent::Discovered(peripheral) => {
                    let discovered = peripheral.address();
                    debug!(
                        "Discovered {} {}",
                        discovered,
                        peripheral.local_name().unwrap_or_default()
                    );
                    if discovered == address {
                        return Some(peripheral);
                    }
                }
                TransportEvent::Disconnected(gone) => {
                    debug!("Disconnect on {}", gone);
                }
            }
        }
        None
    }

    /// Lists every device advertising within `given_timeout`.
    pub async fn find_devices<T: Transport + ?Sized>(
        transport: &T,
        given_timeout: Duration,
    ) -> Result<HashSet<DeviceIdentifier>> {
        let mut events = transport.events().await?;
        transport.start_scan().await?;

        let mut discovered_devices = HashSet::<DeviceIdentifier>::new();
        let collect = async {
            while let Some(event) = events.next().await {
                if let TransportEvent::Discovered(peripheral) = event {
                    let device = DeviceIdentifier::from_peripheral(&peripheral);
                    if discovered_devices.contains(&device) {
                        continue;
                    }
                    info!("Found device: {:?}", device);
                    discovered_devices.insert(device);
                }
            }
        };
        if timeout(given_timeout, collect).await.is_err() {
            debug!("Discovery time complete");
        }
        drop(events);
        transport.stop_scan().await?;

        Ok(discovered_devices)
    }

    pub fn pretty_print_devices(devices: &HashSet<DeviceIdentifier>) {
        let mut devices: Vec<&DeviceIdentifier> = devices.iter().collect();
        devices.sort();

        let max_address_width = devices.iter().map(|d| d.address.len()).max().unwrap_or(0);
        let max_name_width = devices
            .iter()
            .map(|d| max(d.name.as_deref().unwrap_or("").len(), 20))
            .max()
            .unwrap_or(0);

        println!(
            "{:<address_width$} {:<name_width$} RSSI",
            "Address",
            "Device Name",
            address_width = max_address_width + 2,
            name_width = max_name_width + 2,
        );
        println!(
            "{:<address_width$} {:<name_width$} ----",
            "-".repeat(max_address_width),
            "-".repeat(max_name_width),
            address_width = max_address_width + 2,
            name_width = max_name_width + 2,
        );
        for device in devices {
            println!(
                "{:<address_width$} {:<name_width$} {}",
                device.address,
                device.name.as_deref().unwrap_or("Unknown"),
                device
                    .rssi
                    .map(|rssi| format!("{} dBm", rssi))
                    .unwrap_or_else(|| "N/A".to_string()),
                address_width = max_address_width + 2,
                name_width = max_name_width + 2,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::util::simulator::{SimulatedBulb, SimulatedTransport, TransportCall};

    const TARGET: &str = "e8:eb:11:0f:8a:4c";

    fn neighbours(transport: SimulatedTransport, count: usize) -> SimulatedTransport {
        (0..count).fold(transport, |transport, i| {
            transport.with_bulb(SimulatedBulb::new(&format!("11:22:33:44:55:{:02x}", i)))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_target_never_advertises() {
        let transport = neighbours(SimulatedTransport::new(), 3).repeating();
        let config = SessionConfig::default();

        let started = Instant::now();
        let result = Discovery::locate(&transport, TARGET, &config).await;
        let elapsed = started.elapsed();

        match result {
            Err(Error::DeviceNotFound { address, timeout }) => {
                assert_eq!(address, TARGET);
                assert_eq!(timeout, Duration::from_millis(5000));
            }
            other => panic!("expected DeviceNotFound, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
        assert!(!transport.is_scanning());
        assert_eq!(transport.active_subscriptions(), 0);
        assert!(transport.delivered_events() >= 40);
        assert_eq!(
            transport.calls(),
            vec![TransportCall::StartScan, TransportCall::StopScan]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_scanning_at_the_match() {
        let transport = neighbours(SimulatedTransport::new(), 4)
            .with_bulb(SimulatedBulb::new(TARGET))
            .with_bulb(SimulatedBulb::new("11:22:33:44:55:ff"));

        let located = Discovery::locate(&transport, TARGET, &SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(located.device.address(), TARGET);
        assert_eq!(transport.delivered_events(), 5);
        assert!(!transport.is_scanning());
        assert_eq!(transport.active_subscriptions(), 0);
        let calls = transport.calls();
        assert_eq!(
            &calls[..3],
            &[
                TransportCall::StartScan,
                TransportCall::StopScan,
                TransportCall::Connect(TARGET.to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_after_timeout_is_ignored() {
        let transport = neighbours(SimulatedTransport::new(), 2)
            .with_bulb(SimulatedBulb::new(TARGET))
            .with_advertisement_interval(Duration::from_millis(2000));

        let result = Discovery::locate(&transport, TARGET, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
        assert_eq!(transport.delivered_events(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!transport
            .calls()
            .contains(&TransportCall::Connect(TARGET.to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_is_reported() {
        let transport =
            SimulatedTransport::new().with_bulb(SimulatedBulb::new(TARGET).refusing_connection());

        let result = Discovery::locate(&transport, TARGET, &SessionConfig::default()).await;
        match result {
            Err(Error::Connect { address, .. }) => assert_eq!(address, TARGET),
            other => panic!("expected a connect error, got {:?}", other),
        }
        assert!(!transport.is_scanning());
        assert_eq!(transport.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_notices_do_not_end_the_scan() {
        let transport = SimulatedTransport::new()
            .with_disconnect(TARGET)
            .with_bulb(SimulatedBulb::new(TARGET));

        let located = Discovery::locate(&transport, TARGET, &SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(located.device.address(), TARGET);
        assert_eq!(transport.delivered_events(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_devices_lists_each_address_once() {
        let transport = neighbours(SimulatedTransport::new(), 3)
            .with_bulb(SimulatedBulb::new(TARGET).with_name(None))
            .repeating();

        let devices = Discovery::find_devices(&transport, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(devices.len(), 4);
        assert!(devices.contains(&DeviceIdentifier::new(TARGET.to_string(), None, None)));
        assert!(!transport.is_scanning());
        assert_eq!(transport.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_already_running_releases_the_subscription() {
        let transport = SimulatedTransport::new().with_bulb(SimulatedBulb::new(TARGET));
        transport.start_scan().await.unwrap();

        let result = Discovery::locate(&transport, TARGET, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::Transport(TransportError::Rejected(_)))));
        assert_eq!(transport.active_subscriptions(), 0);
        assert_eq!(transport.delivered_events(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_event_stream_is_not_a_timeout() {
        let transport = neighbours(SimulatedTransport::new(), 2).ending_after_script();

        let started = Instant::now();
        let result = Discovery::locate(&transport, TARGET, &SessionConfig::default()).await;
        match result {
            Err(Error::Transport(TransportError::Rejected(reason))) => {
                assert_eq!(reason, "event stream closed")
            }
            other => panic!("expected a closed stream error, got {:?}", other),
        }
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert!(!transport.is_scanning());
        assert_eq!(transport.active_subscriptions(), 0);
    }
}
