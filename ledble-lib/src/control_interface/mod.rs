use log::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::led::color::RGB;
use crate::message::Message;
use crate::util::adapter::await_ready;
use crate::util::discovery::{Discovery, Located};
use crate::util::traits::{CharacteristicInfo, Peripheral, Transport, WriteMode};

/// A connected bulb, ready to take commands.
///
/// A `Bulb` only exists once its device has been found, connected and its
/// command characteristic negotiated. Dropping it leaves the connection to the
/// transport; call [`Bulb::disconnect`] to close it explicitly.
#[derive(Debug, Clone)]
pub struct Bulb<P: Peripheral> {
    device: P,
    characteristic: CharacteristicInfo,
    write_mode: WriteMode,
}

/// Opens the bulb at `address` with the default [`SessionConfig`].
pub async fn open_bulb<T: Transport + ?Sized>(
    transport: &T,
    address: &str,
) -> Result<Bulb<T::Peripheral>> {
    Bulb::open(transport, address, &SessionConfig::default()).await
}

impl<P: Peripheral> Bulb<P> {
    /// Waits for the adapter, finds the bulb, connects and negotiates.
    pub async fn open<T>(transport: &T, address: &str, config: &SessionConfig) -> Result<Self>
    where
        T: Transport<Peripheral = P> + ?Sized,
    {
        await_ready(transport, config).await?;
        let Located {
            device,
            characteristic,
        } = Discovery::locate(transport, address, config).await?;
        info!("Bulb {} ready on characteristic {}", address, characteristic.uuid);
        Ok(Bulb::from_parts(device, characteristic, config.write_mode()))
    }

    /// Opens every address in turn, one scan at a time.
    ///
    /// When one of them fails, the bulbs opened before it are disconnected and
    /// the failure is returned.
    pub async fn open_all<T, A>(
        transport: &T,
        addresses: &[A],
        config: &SessionConfig,
    ) -> Result<Vec<Self>>
    where
        T: Transport<Peripheral = P> + ?Sized,
        A: AsRef<str>,
    {
        let mut bulbs = Vec::with_capacity(addresses.len());
        for address in addresses {
            match Bulb::open(transport, address.as_ref(), config).await {
                Ok(bulb) => bulbs.push(bulb),
                Err(e) => {
                    for bulb in &bulbs {
                        if let Err(close) = bulb.disconnect().await {
                            warn!("Failed to disconnect from {}: {}", bulb.address(), close);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(bulbs)
    }

    /// Wraps an already negotiated device.
    pub fn from_parts(device: P, characteristic: CharacteristicInfo, write_mode: WriteMode) -> Self {
        Bulb {
            device,
            characteristic,
            write_mode,
        }
    }

    pub fn address(&self) -> String {
        self.device.address()
    }

    pub fn characteristic(&self) -> &CharacteristicInfo {
        &self.characteristic
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.send(Message::TurnOn, &[]).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.send(Message::TurnOff, &[]).await
    }

    pub async fn set_color(&self, red: u8, green: u8, blue: u8) -> Result<()> {
        self.send(Message::SetColor, &[red, green, blue]).await
    }

    pub async fn set_rgb(&self, rgb: RGB) -> Result<()> {
        self.set_color(rgb.red, rgb.green, rgb.blue).await
    }

    pub async fn set_brightness(&self, brightness: u8) -> Result<()> {
        self.send(Message::SetBrightness, &[brightness]).await
    }

    /// Starts a built-in animation. `effect` is an [`Effect`] or a raw code.
    ///
    /// [`Effect`]: crate::led::effect::Effect
    pub async fn set_effect(&self, effect: impl Into<u8>, speed: u8) -> Result<()> {
        self.send(Message::SetEffect, &[effect.into(), speed]).await
    }

    /// Encodes `kind` with `parameters` and writes the frame.
    pub async fn send(&self, kind: Message, parameters: &[u8]) -> Result<()> {
        let frame = kind.encode(parameters)?;
        debug!("{} {} {:02X?}", self.device.address(), kind, frame);
        self.device
            .write(&self.characteristic, &frame, self.write_mode)
            .await
            .map_err(|source| Error::Write { source })
    }

    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.device.is_connected().await?)
    }

    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from {}", self.device.address());
        Ok(self.device.disconnect().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::effect::Effect;
    use crate::util::simulator::{SimulatedBulb, SimulatedTransport, TransportCall};
    use crate::util::traits::AdapterState;

    const ADDRESS: &str = "e8:eb:11:0f:8a:4c";

    fn transport() -> SimulatedTransport {
        SimulatedTransport::new()
            .with_bulb(SimulatedBulb::new("ff:ff:97:02:3a:c8"))
            .with_bulb(SimulatedBulb::new(ADDRESS))
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_color_writes_one_frame() {
        let transport = transport();
        let bulb = open_bulb(&transport, ADDRESS).await.unwrap();

        bulb.set_color(255, 0, 0).await.unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].address, ADDRESS);
        assert_eq!(writes[0].data, vec![0x56, 0xFF, 0x00, 0x00, 0x00, 0xF0, 0xAA]);
        assert_eq!(writes[0].mode, WriteMode::WithoutResponse);
        assert_eq!(&writes[0].characteristic, bulb.characteristic());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_written_in_order() {
        let transport = transport();
        let bulb = open_bulb(&transport, ADDRESS).await.unwrap();

        bulb.turn_on().await.unwrap();
        bulb.set_brightness(200).await.unwrap();
        bulb.set_effect(Effect::SevenColorCrossFade, 5).await.unwrap();
        bulb.turn_off().await.unwrap();

        let frames: Vec<Vec<u8>> = transport.writes().into_iter().map(|w| w.data).collect();
        assert_eq!(
            frames,
            vec![
                vec![0xCC, 0x23, 0x33],
                vec![0x56, 0x00, 0x00, 0x00, 0xC8, 0x0F, 0xAA],
                vec![0xBB, 0x25, 0x05, 0x44],
                vec![0xCC, 0x24, 0x33],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledged_writes_are_configurable() {
        let transport = transport();
        let config = SessionConfig::default().with_acknowledged_writes(true);
        let bulb = Bulb::open(&transport, ADDRESS, &config).await.unwrap();

        bulb.set_rgb(RGB::new(0, 0, 100)).await.unwrap();
        assert_eq!(transport.writes()[0].mode, WriteMode::WithResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_timeout_stops_before_scanning() {
        let transport = transport().with_adapter_states(vec![AdapterState::PoweredOff]);

        let result = open_bulb(&transport, ADDRESS).await;
        assert!(matches!(result, Err(Error::AdapterTimeout { .. })));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_surfaces() {
        let transport =
            SimulatedTransport::new().with_bulb(SimulatedBulb::new(ADDRESS).failing_writes());
        let bulb = open_bulb(&transport, ADDRESS).await.unwrap();

        assert!(matches!(bulb.turn_on().await, Err(Error::Write { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect() {
        let transport = transport();
        let bulb = open_bulb(&transport, ADDRESS).await.unwrap();
        assert!(bulb.is_connected().await.unwrap());

        bulb.disconnect().await.unwrap();
        assert!(!bulb.is_connected().await.unwrap());
        assert!(matches!(bulb.turn_on().await, Err(Error::Write { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_share_one_transport() {
        let transport = transport().repeating();
        let first = open_bulb(&transport, ADDRESS).await.unwrap();
        let second = open_bulb(&transport, "ff:ff:97:02:3a:c8").await.unwrap();

        first.set_color(0, 0, 100).await.unwrap();
        second.set_color(0, 0, 100).await.unwrap();

        let addresses: Vec<String> = transport.writes().into_iter().map(|w| w.address).collect();
        assert_eq!(addresses, vec![ADDRESS.to_string(), "ff:ff:97:02:3a:c8".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_read_failure_stops_before_scanning() {
        let transport = transport()
            .with_adapter_states(vec![AdapterState::PoweredOff])
            .failing_adapter_after(1);

        let result = open_bulb(&transport, ADDRESS).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(!transport.calls().contains(&TransportCall::StartScan));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_all_in_order() {
        let transport = transport().repeating();
        let bulbs = Bulb::open_all(
            &transport,
            &[ADDRESS, "ff:ff:97:02:3a:c8"],
            &SessionConfig::default(),
        )
        .await
        .unwrap();

        let addresses: Vec<String> = bulbs.iter().map(|b| b.address()).collect();
        assert_eq!(addresses, vec![ADDRESS.to_string(), "ff:ff:97:02:3a:c8".to_string()]);
        assert!(!transport.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_all_disconnects_opened_bulbs_on_failure() {
        let transport = SimulatedTransport::new()
            .with_bulb(SimulatedBulb::new(ADDRESS))
            .with_bulb(SimulatedBulb::new("ff:ff:97:02:3a:c8").refusing_connection())
            .repeating();
        let addresses = vec![ADDRESS.to_string(), "ff:ff:97:02:3a:c8".to_string()];

        let result = Bulb::open_all(&transport, &addresses, &SessionConfig::default()).await;
        match result {
            Err(Error::Connect { address, .. }) => assert_eq!(address, "ff:ff:97:02:3a:c8"),
            other => panic!("expected a connect error, got {:?}", other.map(|b| b.len())),
        }
        assert!(transport
            .calls()
            .contains(&TransportCall::Disconnect(ADDRESS.to_string())));
        assert_eq!(transport.active_subscriptions(), 0);
    }
}
