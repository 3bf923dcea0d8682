//! An in-process stand-in for the Bluetooth stack.
//!
//! [`SimulatedTransport`] plays back a scripted list of advertisements, answers
//! connection and discovery requests from scripted bulbs, and records every call
//! and every write so tests (and `ledble --simulate`) can inspect what a session
//! actually sent.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::debug;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::{SUPPORTED_CHARACTERISTIC_UUIDS, SUPPORTED_SERVICE_UUIDS};
use crate::error::TransportError;
use crate::util::traits::{
    AdapterState, CharacteristicInfo, EventStream, Peripheral, ServiceInfo, Transport,
    TransportEvent, WriteMode,
};

const DEFAULT_ADVERTISEMENT_INTERVAL: Duration = Duration::from_millis(100);

/// A scripted device.
#[derive(Debug, Clone)]
pub struct SimulatedBulb {
    address: String,
    name: Option<String>,
    rssi: Option<i16>,
    services: Vec<(Uuid, Vec<Uuid>)>,
    refuse_connection: bool,
    fail_writes: bool,
}

impl SimulatedBulb {
    /// A bulb exposing the first supported service and characteristic.
    pub fn new(address: &str) -> Self {
        SimulatedBulb {
            address: address.to_string(),
            name: Some("LEDBLE".to_string()),
            rssi: Some(-60),
            services: vec![(
                SUPPORTED_SERVICE_UUIDS[0],
                vec![SUPPORTED_CHARACTERISTIC_UUIDS[0]],
            )],
            refuse_connection: false,
            fail_writes: false,
        }
    }

    pub fn with_name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_string);
        self
    }

    /// Replaces the GATT table with `(service, characteristics)` pairs, in
    /// discovery order.
    pub fn with_services(mut self, services: Vec<(Uuid, Vec<Uuid>)>) -> Self {
        self.services = services;
        self
    }

    pub fn refusing_connection(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Calls made against the simulator, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    StartScan,
    StopScan,
    Connect(String),
    Disconnect(String),
    DiscoverServices(String),
    DiscoverCharacteristics(Uuid),
}

/// A frame written to a simulated bulb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub address: String,
    pub characteristic: CharacteristicInfo,
    pub data: Vec<u8>,
    pub mode: WriteMode,
}

#[derive(Debug, Clone)]
enum ScriptedEvent {
    Advertise(SimulatedBulb),
    Disconnect(String),
}

#[derive(Debug)]
struct SimState {
    adapter_states: VecDeque<AdapterState>,
    script: Vec<ScriptedEvent>,
    adapter_fail_after: Option<usize>,
    interval: Duration,
    repeat: bool,
    end_feed: bool,
    scanning: bool,
    connected: HashSet<String>,
    calls: Vec<TransportCall>,
    writes: Vec<RecordedWrite>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SimState>,
    delivered: AtomicUsize,
    adapter_polls: AtomicUsize,
    subscriptions: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: TransportCall) {
        self.lock().calls.push(call);
    }
}

/// Held by an event stream for as long as it lives.
#[derive(Debug)]
struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    fn new(shared: Arc<Shared>) -> Self {
        shared.subscriptions.fetch_add(1, Ordering::SeqCst);
        Subscription { shared }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.subscriptions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A scripted transport. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    shared: Arc<Shared>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// A powered-on adapter with nothing around it.
    pub fn new() -> Self {
        SimulatedTransport {
            shared: Arc::new(Shared {
                state: Mutex::new(SimState {
                    adapter_states: VecDeque::from([AdapterState::PoweredOn]),
                    adapter_fail_after: None,
                    script: Vec::new(),
                    interval: DEFAULT_ADVERTISEMENT_INTERVAL,
                    repeat: false,
                    end_feed: false,
                    scanning: false,
                    connected: HashSet::new(),
                    calls: Vec::new(),
                    writes: Vec::new(),
                }),
                delivered: AtomicUsize::new(0),
                adapter_polls: AtomicUsize::new(0),
                subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// States returned by successive adapter polls. The last one sticks.
    pub fn with_adapter_states(self, states: Vec<AdapterState>) -> Self {
        self.shared.lock().adapter_states = states.into();
        self
    }

    /// Lets the first `polls` adapter state reads succeed and fails every
    /// read after them.
    pub fn failing_adapter_after(self, polls: usize) -> Self {
        self.shared.lock().adapter_fail_after = Some(polls);
        self
    }

    /// Adds an advertisement from `bulb` to the end of the script.
    pub fn with_bulb(self, bulb: SimulatedBulb) -> Self {
        self.shared.lock().script.push(ScriptedEvent::Advertise(bulb));
        self
    }

    /// Adds a disconnect notice for `address` to the end of the script.
    pub fn with_disconnect(self, address: &str) -> Self {
        self.shared
            .lock()
            .script
            .push(ScriptedEvent::Disconnect(address.to_string()));
        self
    }

    /// Time between two scripted events.
    pub fn with_advertisement_interval(self, interval: Duration) -> Self {
        self.shared.lock().interval = interval;
        self
    }

    /// Replays the script for as long as someone listens.
    pub fn repeating(self) -> Self {
        self.shared.lock().repeat = true;
        self
    }

    /// Closes the event stream once the script has been played, instead of
    /// keeping it open and silent.
    pub fn ending_after_script(self) -> Self {
        self.shared.lock().end_feed = true;
        self
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.lock().scanning
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.shared.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.shared.lock().writes.clone()
    }

    /// Number of events handed to subscribers so far.
    pub fn delivered_events(&self) -> usize {
        self.shared.delivered.load(Ordering::SeqCst)
    }

    pub fn adapter_polls(&self) -> usize {
        self.shared.adapter_polls.load(Ordering::SeqCst)
    }

    /// Number of event streams handed out and not yet dropped.
    pub fn active_subscriptions(&self) -> usize {
        self.shared.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    type Peripheral = SimulatedPeripheral;

    async fn adapter_state(&self) -> Result<AdapterState, TransportError> {
        let previous = self.shared.adapter_polls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.lock();
        if matches!(state.adapter_fail_after, Some(polls) if previous >= polls) {
            return Err(TransportError::Rejected(
                "adapter state unavailable".to_string(),
            ));
        }
        let current = if state.adapter_states.len() > 1 {
            state.adapter_states.pop_front()
        } else {
            state.adapter_states.front().copied()
        };
        Ok(current.unwrap_or(AdapterState::Unknown))
    }

    async fn events(&self) -> Result<EventStream<SimulatedPeripheral>, TransportError> {
        let (script, interval, repeat, end_feed) = {
            let state = self.shared.lock();
            (state.script.clone(), state.interval, state.repeat, state.end_feed)
        };
        let shared = Arc::clone(&self.shared);
        let events: Vec<TransportEvent<SimulatedPeripheral>> = script
            .into_iter()
            .map(|event| match event {
                ScriptedEvent::Advertise(bulb) => TransportEvent::Discovered(SimulatedPeripheral {
                    bulb: Arc::new(bulb),
                    shared: Arc::clone(&shared),
                }),
                ScriptedEvent::Disconnect(address) => TransportEvent::Disconnected(address),
            })
            .collect();

        let feed = if repeat {
            stream::iter(events).cycle().boxed()
        } else {
            stream::iter(events).boxed()
        };
        let subscription = Subscription::new(Arc::clone(&self.shared));
        let feed = feed
            .then(move |event| async move {
                sleep(interval).await;
                event
            })
            .inspect(move |_| {
                subscription.shared.delivered.fetch_add(1, Ordering::SeqCst);
            });
        if end_feed {
            Ok(feed.boxed())
        } else {
            Ok(feed.chain(stream::pending()).boxed())
        }
    }

    async fn start_scan(&self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.calls.push(TransportCall::StartScan);
        if state.scanning {
            return Err(TransportError::Rejected(
                "a scan is already in progress".to_string(),
            ));
        }
        state.scanning = true;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state.calls.push(TransportCall::StopScan);
        state.scanning = false;
        Ok(())
    }
}

/// A device handed out by [`SimulatedTransport`]'s event stream.
#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    bulb: Arc<SimulatedBulb>,
    shared: Arc<Shared>,
}

impl SimulatedPeripheral {
    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.shared.lock().connected.contains(&self.bulb.address) {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!(
                "{} is not connected",
                self.bulb.address
            )))
        }
    }
}

#[async_trait]
impl Peripheral for SimulatedPeripheral {
    fn address(&self) -> String {
        self.bulb.address.clone()
    }

    fn local_name(&self) -> Option<String> {
        self.bulb.name.clone()
    }

    fn rssi(&self) -> Option<i16> {
        self.bulb.rssi
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.shared
            .record(TransportCall::Connect(self.bulb.address.clone()));
        if self.bulb.refuse_connection {
            return Err(TransportError::Rejected("connection refused".to_string()));
        }
        self.shared
            .lock()
            .connected
            .insert(self.bulb.address.clone());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        state
            .calls
            .push(TransportCall::Disconnect(self.bulb.address.clone()));
        state.connected.remove(&self.bulb.address);
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, TransportError> {
        Ok(self.shared.lock().connected.contains(&self.bulb.address))
    }

    // Like most real stacks, the simulator ignores the allow-list and reports
    // every service.
    async fn discover_services(
        &self,
        _allowlist: &[Uuid],
    ) -> Result<Vec<ServiceInfo>, TransportError> {
        self.shared
            .record(TransportCall::DiscoverServices(self.bulb.address.clone()));
        self.ensure_connected()?;
        Ok(self
            .bulb
            .services
            .iter()
            .map(|(uuid, _)| ServiceInfo { uuid: *uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        _allowlist: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        self.shared
            .record(TransportCall::DiscoverCharacteristics(service.uuid));
        self.ensure_connected()?;
        let characteristics = self
            .bulb
            .services
            .iter()
            .filter(|(uuid, _)| *uuid == service.uuid)
            .flat_map(|(_, characteristics)| characteristics.iter())
            .map(|uuid| CharacteristicInfo {
                uuid: *uuid,
                service_uuid: service.uuid,
            })
            .collect();
        Ok(characteristics)
    }

    async fn write(
        &self,
        characteristic: &CharacteristicInfo,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let known = self.bulb.services.iter().any(|(service, characteristics)| {
            *service == characteristic.service_uuid && characteristics.contains(&characteristic.uuid)
        });
        if !known {
            return Err(TransportError::UnknownCharacteristic(characteristic.uuid));
        }
        if self.bulb.fail_writes {
            return Err(TransportError::Rejected("write failed".to_string()));
        }
        debug!("{} <- {:02X?} ({:?})", self.bulb.address, data, mode);
        self.shared.lock().writes.push(RecordedWrite {
            address: self.bulb.address.clone(),
            characteristic: *characteristic,
            data: data.to_vec(),
            mode,
        });
        Ok(())
    }
}
