//! Simulated installations.
//!
//! A premise is one KNX installation: a set of devices, a tunnelling server
//! on its own UDP port and the scenarios that drive it.
//!
//! The [`Dispatcher`] is the bus of a premise. It maps group addresses to
//! the devices listening on them and routes decoded telegrams:
//!
//! - `GroupValue_Write` is delivered to every listener; their responses are
//!   collected in registration order.
//! - `GroupValue_Read` is answered by the first listener that has a value.
//! - `GroupValue_Response` from clients is observed but not routed.
//!
//! Observers registered with [`Dispatcher::subscribe`] see every inbound and
//! outbound telegram as a [`TelegramEvent`].

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::configuration::PremiseConfig;
use crate::device::{self, Device, DeviceSpec, DeviceState};
use crate::dpt::{self, DptValue};
use crate::error::{KnxError, Result};
use crate::knx_server::{TunnelServer, POLL_INTERVAL};
use crate::net::{listen_address, Transport, UdpTransport};
use crate::protocol::{Apci, CemiFrame, TunnelChannel};
use crate::scenario::{Scenario, ScenarioRunner, ScenarioSink};
use crate::sim_log;
use crate::utility::lock;
use core::fmt;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

/// Which way a telegram travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelegramDirection {
    /// Received from a tunnelling client
    Inbound,
    /// Sent by the simulator
    Outbound,
}

impl TelegramDirection {
    /// Short label used in logs
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inbound => "RX",
            Self::Outbound => "TX",
        }
    }
}

/// A telegram seen on a premise, with whatever could be decoded from it
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramEvent {
    /// When the telegram was seen
    pub timestamp: SystemTime,
    /// Premise id
    pub premise: String,
    /// Direction
    pub direction: TelegramDirection,
    /// The telegram
    pub frame: CemiFrame,
    /// Device bound to the destination
    pub device_id: Option<String>,
    /// Name of the group object on that device
    pub group_object: Option<String>,
    /// DPT of that group object
    pub dpt: Option<String>,
    /// Payload decoded with that DPT
    pub value: Option<DptValue>,
}

/// Telegram observer callback.
///
/// Called with the dispatcher locked: observers must not call back into it.
pub type Observer = Box<dyn Fn(&TelegramEvent) + Send + Sync>;

/// Device set and telegram routing of one premise
pub struct Dispatcher {
    premise: String,
    devices: Vec<Box<dyn Device>>,
    by_ga: BTreeMap<GroupAddress, Vec<usize>>,
    observers: Vec<Observer>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("premise", &self.premise)
            .field("devices", &self.devices)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Empty dispatcher for premise `premise`
    pub fn new(premise: impl Into<String>) -> Self {
        Self {
            premise: premise.into(),
            devices: Vec::new(),
            by_ga: BTreeMap::new(),
            observers: Vec::new(),
        }
    }

    /// Premise id
    pub fn premise(&self) -> &str {
        &self.premise
    }

    /// Construct a device of type `kind` and register it
    ///
    /// # Errors
    ///
    /// Returns a device error for an unknown type, a duplicate id or an
    /// invalid group object layout.
    pub fn create_device(&mut self, kind: &str, spec: DeviceSpec) -> Result<&dyn Device> {
        let device = device::create(kind, spec)?;
        self.add_device(device)?;
        let index = self.devices.len() - 1;
        Ok(self.devices[index].as_ref())
    }

    /// Register an already built device
    ///
    /// # Errors
    ///
    /// Returns a device error when the id is taken.
    pub fn add_device(&mut self, device: Box<dyn Device>) -> Result<()> {
        if self.index_of(device.id()).is_some() {
            return Err(KnxError::duplicate_device(device.id()));
        }
        sim_log!(
            info,
            "{}: device added: {} ({}) [{}]",
            self.premise,
            device.id(),
            device.kind(),
            device.individual_address()
        );
        self.devices.push(device);
        self.reindex();
        Ok(())
    }

    /// Unregister a device, returning it
    ///
    /// # Errors
    ///
    /// Returns a device error when no device has that id.
    pub fn remove_device(&mut self, id: &str) -> Result<Box<dyn Device>> {
        let index = self.index_of(id).ok_or_else(|| KnxError::unknown_device(id))?;
        let device = self.devices.remove(index);
        self.reindex();
        sim_log!(info, "{}: device removed: {}", self.premise, id);
        Ok(device)
    }

    /// Device with id `id`
    pub fn device(&self, id: &str) -> Option<&dyn Device> {
        self.index_of(id).map(|i| self.devices[i].as_ref())
    }

    /// All devices in registration order
    pub fn devices(&self) -> impl Iterator<Item = &dyn Device> {
        self.devices.iter().map(|d| d.as_ref())
    }

    /// Devices listening on `ga`, in registration order
    pub fn listeners(&self, ga: GroupAddress) -> impl Iterator<Item = &dyn Device> {
        self.by_ga
            .get(&ga)
            .into_iter()
            .flatten()
            .map(|&i| self.devices[i].as_ref())
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no device is registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Route a telegram received from a client, returning the responses.
    ///
    /// Device errors are logged and do not stop delivery to the remaining
    /// listeners.
    pub fn dispatch(&mut self, frame: &CemiFrame) -> Vec<CemiFrame> {
        self.observe(TelegramDirection::Inbound, frame);
        let Some(ga) = frame.group_address() else {
            return Vec::new();
        };

        let responses = match frame.apci {
            Apci::GroupValueWrite => self.deliver_write(ga, &frame.payload, None),
            Apci::GroupValueRead => self.deliver_read(ga).into_iter().collect(),
            _ => Vec::new(),
        };
        for response in &responses {
            self.observe(TelegramDirection::Outbound, response);
        }
        responses
    }

    /// Set a device field from inside the simulation.
    ///
    /// Returns the indications the device emits, followed by the responses
    /// of other devices on the same group addresses, which receive the
    /// indication like any bus participant would.
    ///
    /// # Errors
    ///
    /// Returns a device error for an unknown device or field, or a DPT error
    /// when the value does not fit the group object.
    pub fn update_device(&mut self, id: &str, field: &str, value: DptValue) -> Result<Vec<CemiFrame>> {
        let index = self.index_of(id).ok_or_else(|| KnxError::unknown_device(id))?;
        let indications = self.devices[index].update(field, value)?;

        let mut frames = Vec::with_capacity(indications.len());
        for indication in indications {
            self.observe(TelegramDirection::Outbound, &indication);
            let echoes = match indication.group_address() {
                Some(ga) => self.deliver_write(ga, &indication.payload, Some(index)),
                None => Vec::new(),
            };
            for echo in &echoes {
                self.observe(TelegramDirection::Outbound, echo);
            }
            frames.push(indication);
            frames.extend(echoes);
        }
        Ok(frames)
    }

    /// Snapshot of every device's state, keyed by device id
    pub fn device_states(&self) -> BTreeMap<String, DeviceState> {
        self.devices
            .iter()
            .map(|d| (d.id().to_string(), d.state().clone()))
            .collect()
    }

    /// Register a telegram observer
    pub fn subscribe(&mut self, observer: impl Fn(&TelegramEvent) + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Report `frame` to all observers
    pub fn observe(&self, direction: TelegramDirection, frame: &CemiFrame) {
        sim_log!(
            debug,
            "{}: {} {} {} -> {} [{:02X?}]",
            self.premise,
            direction.label(),
            frame.apci.name(),
            frame.source,
            frame.destination,
            frame.payload.as_slice()
        );
        if self.observers.is_empty() {
            return;
        }
        let event = self.describe(direction, frame);
        for observer in &self.observers {
            observer(&event);
        }
    }

    fn describe(&self, direction: TelegramDirection, frame: &CemiFrame) -> TelegramEvent {
        let ga = frame.group_address();
        let listeners: Vec<&dyn Device> = ga.map(|ga| self.listeners(ga).collect()).unwrap_or_default();
        // Outbound frames belong to the device that sent them
        let device = listeners
            .iter()
            .find(|d| d.individual_address() == frame.source)
            .or_else(|| listeners.first())
            .copied();

        let (group_object, dpt) = match (device, ga) {
            (Some(device), Some(ga)) => (
                device.core().name_of(ga).map(str::to_string),
                device.dpt_for(ga).map(str::to_string),
            ),
            _ => (None, None),
        };
        let value = match &dpt {
            Some(dpt) if !frame.payload.is_empty() => dpt::decode(dpt, &frame.payload).ok(),
            _ => None,
        };

        TelegramEvent {
            timestamp: SystemTime::now(),
            premise: self.premise.clone(),
            direction,
            frame: frame.clone(),
            device_id: device.map(|d| d.id().to_string()),
            group_object,
            dpt,
            value,
        }
    }

    fn deliver_write(&mut self, ga: GroupAddress, payload: &[u8], skip: Option<usize>) -> Vec<CemiFrame> {
        let listeners = self.by_ga.get(&ga).cloned().unwrap_or_default();
        let mut responses = Vec::new();
        for index in listeners.into_iter().filter(|i| Some(*i) != skip) {
            let device = &mut self.devices[index];
            match device.on_group_write(ga, payload) {
                Ok(frames) => responses.extend(frames),
                Err(e) => sim_log!(
                    warn,
                    "{}: {} rejected write on {}: {}",
                    self.premise,
                    device.id(),
                    ga,
                    e
                ),
            }
        }
        responses
    }

    fn deliver_read(&mut self, ga: GroupAddress) -> Option<CemiFrame> {
        let listeners = self.by_ga.get(&ga).cloned().unwrap_or_default();
        for index in listeners {
            let device = &mut self.devices[index];
            match device.on_group_read(ga) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => {}
                Err(e) => sim_log!(
                    warn,
                    "{}: {} failed to answer read on {}: {}",
                    self.premise,
                    device.id(),
                    ga,
                    e
                ),
            }
        }
        None
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.id() == id)
    }

    fn reindex(&mut self) {
        self.by_ga.clear();
        for (index, device) in self.devices.iter().enumerate() {
            for (_, ga) in device.group_objects() {
                let entry = self.by_ga.entry(*ga).or_default();
                if !entry.contains(&index) {
                    entry.push(index);
                }
            }
        }
    }
}

/// Shared access to a running premise: its dispatcher and its server
#[derive(Debug)]
pub struct PremiseHandle<T: Transport> {
    dispatcher: Arc<Mutex<Dispatcher>>,
    server: Arc<TunnelServer<T>>,
}

impl<T: Transport> Clone for PremiseHandle<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            server: Arc::clone(&self.server),
        }
    }
}

impl<T: Transport> PremiseHandle<T> {
    /// Handle on `server` and the dispatcher it delivers to
    pub fn new(server: Arc<TunnelServer<T>>) -> Self {
        Self {
            dispatcher: Arc::clone(server.dispatcher()),
            server,
        }
    }

    /// The tunnelling server
    pub fn server(&self) -> &Arc<TunnelServer<T>> {
        &self.server
    }

    /// Broadcast `frame` to all connected clients
    pub fn send(&self, frame: &CemiFrame) -> usize {
        lock(&self.dispatcher).observe(TelegramDirection::Outbound, frame);
        self.server.broadcast(frame)
    }

    /// Set a device field and broadcast the resulting telegrams
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::update_device`].
    pub fn update_device(&self, id: &str, field: &str, value: DptValue) -> Result<usize> {
        let frames = lock(&self.dispatcher).update_device(id, field, value)?;
        for frame in &frames {
            self.server.broadcast(frame);
        }
        Ok(frames.len())
    }
}

impl<T: Transport> ScenarioSink for PremiseHandle<T> {
    fn apply(&self, device: &str, field: &str, value: DptValue) -> Result<()> {
        self.update_device(device, field, value).map(|_| ())
    }
}

/// A configured installation and, once started, its worker threads
#[derive(Debug)]
pub struct Premise {
    config: PremiseConfig,
    dispatcher: Arc<Mutex<Dispatcher>>,
    running: Arc<AtomicBool>,
    handle: Option<PremiseHandle<UdpTransport>>,
    server_thread: Option<JoinHandle<()>>,
    scenarios: Option<ScenarioRunner>,
}

impl Premise {
    /// Build the device set of `config`
    ///
    /// # Errors
    ///
    /// Returns the first device construction error.
    pub fn new(config: PremiseConfig) -> Result<Self> {
        let mut dispatcher = Dispatcher::new(config.id.clone());
        for device in &config.devices {
            dispatcher.create_device(&device.kind, device.spec())?;
        }
        Ok(Self {
            config,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            server_thread: None,
            scenarios: None,
        })
    }

    /// Premise id
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Configuration the premise was built from
    pub fn config(&self) -> &PremiseConfig {
        &self.config
    }

    /// Shared dispatcher
    pub fn dispatcher(&self) -> &Arc<Mutex<Dispatcher>> {
        &self.dispatcher
    }

    /// Register a telegram observer
    pub fn subscribe(&self, observer: impl Fn(&TelegramEvent) + Send + Sync + 'static) {
        lock(&self.dispatcher).subscribe(observer);
    }

    /// True between `start` and `stop`
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Bind the UDP port and start the server and scenario threads.
    ///
    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error when already running, when the address cannot be
    /// bound or when a thread cannot be started.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(KnxError::InvalidState);
        }

        let addr = listen_address(&self.config.bind, self.config.port)?;
        let transport = UdpTransport::bind(addr, POLL_INTERVAL)?;
        let server = Arc::new(TunnelServer::new(
            self.config.id.clone(),
            transport,
            self.config.server_settings(),
            Arc::clone(&self.dispatcher),
        ));
        let local = server.local_addr()?;
        self.running.store(true, Ordering::Relaxed);

        let serving = Arc::clone(&server);
        let running = Arc::clone(&self.running);
        let spawned = thread::Builder::new()
            .name(format!("knx-{}", self.config.id))
            .spawn(move || {
                if serving.serve(&running).is_err() {
                    running.store(false, Ordering::Relaxed);
                }
            });
        let server_thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.running.store(false, Ordering::Relaxed);
                return Err(KnxError::spawn_failed(e));
            }
        };
        self.server_thread = Some(server_thread);

        let handle = PremiseHandle::new(server);
        let mut runner = ScenarioRunner::new(Arc::clone(&self.running));
        let sink: Arc<dyn ScenarioSink> = Arc::new(handle.clone());
        for scenario in &self.config.scenarios {
            if let Err(e) = runner.spawn(Scenario::from(scenario), Arc::clone(&sink)) {
                self.handle = Some(handle);
                self.scenarios = Some(runner);
                self.stop();
                return Err(e);
            }
        }
        self.handle = Some(handle);
        self.scenarios = Some(runner);

        sim_log!(
            info,
            "Premise started: {} ({}) on {} with {} device(s)",
            self.config.id,
            self.config.display_name(),
            local,
            lock(&self.dispatcher).len()
        );
        Ok(local)
    }

    /// Signal all threads to stop and wait for them
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::Relaxed);
        if let Some(mut runner) = self.scenarios.take() {
            runner.stop();
        }
        if let Some(thread) = self.server_thread.take() {
            if thread.join().is_err() {
                sim_log!(error, "{}: server thread panicked", self.config.id);
            }
        }
        self.handle = None;
        if was_running {
            sim_log!(info, "Premise stopped: {}", self.config.id);
        }
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().and_then(|h| h.server().local_addr().ok())
    }

    /// Connected tunnelling channels
    pub fn channels(&self) -> Vec<TunnelChannel> {
        self.handle
            .as_ref()
            .map(|h| h.server().channels())
            .unwrap_or_default()
    }

    /// Broadcast `frame` to all clients, returning how many were reached
    pub fn send(&self, frame: &CemiFrame) -> usize {
        match &self.handle {
            Some(handle) => handle.send(frame),
            None => {
                lock(&self.dispatcher).observe(TelegramDirection::Outbound, frame);
                0
            }
        }
    }

    /// Set a device field; while running the resulting telegrams are
    /// broadcast
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::update_device`].
    pub fn update_device(&self, id: &str, field: &str, value: DptValue) -> Result<usize> {
        match &self.handle {
            Some(handle) => handle.update_device(id, field, value),
            None => lock(&self.dispatcher)
                .update_device(id, field, value)
                .map(|frames| frames.len()),
        }
    }

    /// Snapshot of every device's state
    pub fn device_states(&self) -> BTreeMap<String, DeviceState> {
        lock(&self.dispatcher).device_states()
    }

    /// Address of the simulated gateway
    pub fn gateway_address(&self) -> IndividualAddress {
        self.config.gateway_address
    }
}

impl Drop for Premise {
    fn drop(&mut self) {
        self.stop();
    }
}
