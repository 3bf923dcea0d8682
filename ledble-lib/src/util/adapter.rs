use log::{debug, info};
use tokio::time::sleep;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::util::traits::Transport;

/// Waits until the adapter reports `PoweredOn`.
///
/// Returns at once when the adapter is already up. Otherwise the state is
/// re-read every `ready_poll_interval_ms`; a tick that finds the adapter up
/// resolves, and the first tick after `ready_poll_attempts` failed ones gives
/// up with [`Error::AdapterTimeout`].
pub async fn await_ready<T: Transport + ?Sized>(transport: &T, config: &SessionConfig) -> Result<()> {
    let state = transport.adapter_state().await?;
    if state.is_ready() {
        return Ok(());
    }
    info!("Waiting for Bluetooth adapter to power on (currently {})", state);

    let interval = config.ready_poll_interval();
    let mut tries = config.ready_poll_attempts;
    loop {
        sleep(interval).await;
        let state = transport.adapter_state().await?;
        if state.is_ready() {
            info!("Bluetooth adapter powered on");
            return Ok(());
        }
        debug!("Adapter state {}, {} polls left", state, tries);
        if tries < 1 {
            return Err(Error::AdapterTimeout {
                attempts: config.ready_poll_attempts,
            });
        }
        tries -= 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::util::simulator::SimulatedTransport;
    use crate::util::traits::AdapterState;

    #[tokio::test(start_paused = true)]
    async fn test_ready_adapter_does_not_wait() {
        let transport = SimulatedTransport::new();
        let started = Instant::now();
        await_ready(&transport, &SessionConfig::default()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(transport.adapter_polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_the_tick_that_sees_power() {
        let transport = SimulatedTransport::new().with_adapter_states(vec![
            AdapterState::PoweredOff,
            AdapterState::PoweredOff,
            AdapterState::Resetting,
            AdapterState::PoweredOn,
        ]);
        let started = Instant::now();
        await_ready(&transport, &SessionConfig::default()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(transport.adapter_polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let transport =
            SimulatedTransport::new().with_adapter_states(vec![AdapterState::PoweredOff]);
        let started = Instant::now();
        let result = await_ready(&transport, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::AdapterTimeout { attempts: 30 })));
        assert_eq!(started.elapsed(), Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_read_failure_is_a_transport_error() {
        let transport = SimulatedTransport::new()
            .with_adapter_states(vec![AdapterState::PoweredOff])
            .failing_adapter_after(2);
        let started = Instant::now();
        let result = await_ready(&transport, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert_eq!(transport.adapter_polls(), 3);
    }
}
