//! KNXnet/IP tunnelling server.
//!
//! One [`TunnelServer`] serves one premise. It owns the channel table and a
//! [`Transport`], and hands decoded group telegrams to the premise
//! [`Dispatcher`].
//!
//! ## Services
//!
//! | Request | Reply |
//! |---------|-------|
//! | `CONNECT_REQUEST` | `CONNECT_RESPONSE` with a channel id and the client address |
//! | `CONNECTIONSTATE_REQUEST` | `CONNECTIONSTATE_RESPONSE` |
//! | `DISCONNECT_REQUEST` | `DISCONNECT_RESPONSE`, channel id freed |
//! | `TUNNELLING_REQUEST` | `TUNNELLING_ACK`, then one `TUNNELLING_REQUEST` per device response |
//! | `TUNNELLING_ACK` | none |
//!
//! Requests naming an unknown channel are answered with `E_CONNECTION_ID`.
//! Malformed datagrams are logged and dropped.
//!
//! ## Locking
//!
//! Sequence numbers are taken under the channel table lock; datagrams are
//! sent after that lock is released, under a separate send lock that keeps
//! the per-channel order of sequence numbers on the wire.
//!
//! ## Example
//!
//! ```rust
//! use knx_sim::knx_server::{ServerSettings, TunnelServer};
//! use knx_sim::net::MockTransport;
//! use knx_sim::premise::Dispatcher;
//! use std::sync::{Arc, Mutex};
//!
//! let dispatcher = Arc::new(Mutex::new(Dispatcher::new("home")));
//! let server = TunnelServer::new("home", MockTransport::new(), ServerSettings::default(), dispatcher);
//! assert!(server.channels().is_empty());
//! ```

use crate::addressing::IndividualAddress;
use crate::error::Result;
use crate::net::Transport;
use crate::premise::Dispatcher;
use crate::protocol::{
    CemiFrame, ChannelRequest, ChannelResponse, ChannelTable, ConnectRequest, ConnectResponse,
    ConnectionHeader, Inbound, KnxnetIpFrame, Outbound, ServiceType, TunnelChannel,
    TunnelingAck, TunnelingRequest, E_CONNECTION_ID, E_CONNECTION_TYPE, E_NO_ERROR,
    E_NO_MORE_CONNECTIONS, MAX_FRAME_SIZE,
};
use crate::sim_log;
use crate::utility::lock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll interval of the receive loop
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Addresses and timeouts of one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address of the simulated gateway itself
    pub gateway_address: IndividualAddress,
    /// Address handed to every tunnelling client
    pub client_address: IndividualAddress,
    /// Close channels without traffic for this long; `None` keeps them forever
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            gateway_address: IndividualAddress::from_parts(1, 0, 0),
            client_address: IndividualAddress::from_parts(1, 0, 255),
            idle_timeout: None,
        }
    }
}

/// Tunnelling server of one premise
#[derive(Debug)]
pub struct TunnelServer<T: Transport> {
    name: String,
    transport: T,
    settings: ServerSettings,
    channels: Mutex<ChannelTable>,
    send_lock: Mutex<()>,
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl<T: Transport> TunnelServer<T> {
    /// Server named `name` (used in logs) on `transport`
    pub fn new(
        name: impl Into<String>,
        transport: T,
        settings: ServerSettings,
        dispatcher: Arc<Mutex<Dispatcher>>,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            settings,
            channels: Mutex::new(ChannelTable::new()),
            send_lock: Mutex::new(()),
            dispatcher,
        }
    }

    /// Server settings
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatcher telegrams are delivered to
    pub fn dispatcher(&self) -> &Arc<Mutex<Dispatcher>> {
        &self.dispatcher
    }

    /// Bound address of the transport
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Copy of the connected channels, in id order
    pub fn channels(&self) -> Vec<TunnelChannel> {
        lock(&self.channels).snapshot()
    }

    /// Receive and handle datagrams until `running` is cleared.
    ///
    /// Idle channels are evicted after every poll.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the loop.
    pub fn serve(&self, running: &AtomicBool) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        sim_log!(info, "{}: tunnelling server running", self.name);

        while running.load(Ordering::Relaxed) && self.transport.is_ready() {
            match self.transport.recv_from(&mut buf) {
                Ok(Some((len, from))) => self.handle_datagram(&buf[..len], from),
                Ok(None) => {}
                Err(e) => {
                    sim_log!(error, "{}: socket error: {}", self.name, e);
                    return Err(e);
                }
            }
            self.evict_idle(Instant::now());
        }

        sim_log!(info, "{}: tunnelling server stopped", self.name);
        Ok(())
    }

    /// Handle one datagram from `from`; failures are logged, never returned
    pub fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        if let Err(e) = self.try_handle(data, from) {
            if e.is_framing_error() {
                sim_log!(warn, "{}: dropping datagram from {}: {}", self.name, from, e);
            } else {
                sim_log!(error, "{}: failed to serve {}: {}", self.name, from, e);
            }
        }
    }

    /// Send `frame` to every connected client, returning how many were reached
    pub fn broadcast(&self, frame: &CemiFrame) -> usize {
        let cemi = match frame.to_bytes() {
            Ok(cemi) => cemi,
            Err(e) => {
                sim_log!(error, "{}: cannot encode {}: {}", self.name, frame, e);
                return 0;
            }
        };
        let _order = lock(&self.send_lock);
        let targets = lock(&self.channels).next_send_all();

        let mut reached = 0;
        for target in &targets {
            match self.send_tunnelling(target, &cemi) {
                Ok(()) => reached += 1,
                Err(e) => sim_log!(
                    error,
                    "{}: channel {} unreachable at {}: {}",
                    self.name,
                    target.channel_id,
                    target.client,
                    e
                ),
            }
        }
        reached
    }

    /// Close channels idle for longer than the configured timeout
    pub fn evict_idle(&self, now: Instant) -> Vec<TunnelChannel> {
        let Some(timeout) = self.settings.idle_timeout else {
            return Vec::new();
        };
        let evicted = lock(&self.channels).evict_idle(now, timeout);
        for channel in &evicted {
            sim_log!(
                warn,
                "{}: channel {} ({}) idle for more than {:?}, closed",
                self.name,
                channel.channel_id,
                channel.client,
                timeout
            );
        }
        evicted
    }

    fn try_handle(&self, data: &[u8], from: SocketAddr) -> Result<()> {
        let frame = KnxnetIpFrame::parse(data)?;
        let body = frame.body();

        match frame.service_type() {
            ServiceType::ConnectRequest => self.on_connect(body, from),
            ServiceType::ConnectionstateRequest => self.on_connection_state(body, from),
            ServiceType::DisconnectRequest => self.on_disconnect(body, from),
            ServiceType::TunnellingRequest => self.on_tunnelling_request(body, from),
            ServiceType::TunnellingAck => {
                sim_log!(trace, "{}: ack from {}", self.name, from);
                Ok(())
            }
            other => {
                sim_log!(debug, "{}: ignoring {:?} from {}", self.name, other, from);
                Ok(())
            }
        }
    }

    fn on_connect(&self, body: &[u8], from: SocketAddr) -> Result<()> {
        let request = ConnectRequest::parse(body)?;

        // Replies and telegrams go to the observed sender, never the stated HPAIs
        let response = if request.cri.is_tunnel() {
            let opened = lock(&self.channels).open(
                from,
                self.settings.client_address,
                Instant::now(),
            );
            match opened {
                Ok(channel_id) => {
                    sim_log!(
                        info,
                        "{}: CONNECT from {} -> channel {}, assigned {}",
                        self.name,
                        from,
                        channel_id,
                        self.settings.client_address
                    );
                    ConnectResponse::accepted(channel_id, self.settings.client_address)
                }
                Err(_) => {
                    sim_log!(warn, "{}: CONNECT from {} rejected, no free channel", self.name, from);
                    ConnectResponse::rejected(E_NO_MORE_CONNECTIONS)
                }
            }
        } else {
            sim_log!(warn, "{}: CONNECT from {} rejected, not a tunnel", self.name, from);
            ConnectResponse::rejected(E_CONNECTION_TYPE)
        };

        let mut buf = [0u8; 32];
        let len = response.build(&mut buf)?;
        self.transport.send_to(&buf[..len], from)
    }

    fn on_connection_state(&self, body: &[u8], from: SocketAddr) -> Result<()> {
        let request = ChannelRequest::parse(body)?;
        let status = match lock(&self.channels).touch(request.channel_id, Instant::now()) {
            Ok(()) => E_NO_ERROR,
            Err(_) => E_CONNECTION_ID,
        };
        if status != E_NO_ERROR {
            sim_log!(warn, "{}: heartbeat for unknown channel {}", self.name, request.channel_id);
        }

        let mut buf = [0u8; 16];
        let len = ChannelResponse::new(request.channel_id, status)
            .build(ServiceType::ConnectionstateResponse, &mut buf)?;
        self.transport.send_to(&buf[..len], from)
    }

    fn on_disconnect(&self, body: &[u8], from: SocketAddr) -> Result<()> {
        let request = ChannelRequest::parse(body)?;
        let status = match lock(&self.channels).close(request.channel_id) {
            Some(channel) => {
                sim_log!(info, "{}: DISCONNECT channel {} ({})", self.name, channel.channel_id, channel.client);
                E_NO_ERROR
            }
            None => {
                sim_log!(warn, "{}: DISCONNECT for unknown channel {}", self.name, request.channel_id);
                E_CONNECTION_ID
            }
        };

        let mut buf = [0u8; 16];
        let len = ChannelResponse::new(request.channel_id, status)
            .build(ServiceType::DisconnectResponse, &mut buf)?;
        self.transport.send_to(&buf[..len], from)
    }

    fn on_tunnelling_request(&self, body: &[u8], from: SocketAddr) -> Result<()> {
        let request = TunnelingRequest::parse(body)?;
        let ConnectionHeader {
            channel_id,
            sequence_counter,
            ..
        } = request.connection_header;

        let inbound = lock(&self.channels).accept_inbound(channel_id, sequence_counter, Instant::now());
        let status = if inbound.is_ok() { E_NO_ERROR } else { E_CONNECTION_ID };

        let mut buf = [0u8; 16];
        let len = TunnelingAck::new(channel_id, sequence_counter, status).build(&mut buf)?;
        self.transport.send_to(&buf[..len], from)?;

        match inbound {
            Ok(Inbound::New) => {}
            Ok(Inbound::Repeated) => {
                sim_log!(debug, "{}: repeated seq {} on channel {}", self.name, sequence_counter, channel_id);
                return Ok(());
            }
            Err(_) => {
                sim_log!(warn, "{}: TUNNELLING_REQUEST for unknown channel {}", self.name, channel_id);
                return Ok(());
            }
        }

        let frame = CemiFrame::parse(request.cemi_data)?;
        sim_log!(
            debug,
            "{}: <- ch={} seq={} {} {} -> {} [{:02X?}]",
            self.name,
            channel_id,
            sequence_counter,
            frame.apci.name(),
            frame.source,
            frame.destination,
            frame.payload.as_slice()
        );
        if !frame.destination.is_group() {
            return Ok(());
        }

        let responses = lock(&self.dispatcher).dispatch(&frame);
        if responses.is_empty() {
            return Ok(());
        }
        self.reply(channel_id, &responses)
    }

    /// Send `responses` to one channel, in order
    fn reply(&self, channel_id: u8, responses: &[CemiFrame]) -> Result<()> {
        let encoded = responses
            .iter()
            .map(CemiFrame::to_bytes)
            .collect::<Result<Vec<_>>>()?;
        let _order = lock(&self.send_lock);
        let targets = {
            let mut table = lock(&self.channels);
            responses
                .iter()
                .map(|_| table.next_send(channel_id))
                .collect::<Result<Vec<Outbound>>>()?
        };
        for (target, cemi) in targets.iter().zip(&encoded) {
            self.send_tunnelling(target, cemi)?;
        }
        Ok(())
    }

    fn send_tunnelling(&self, target: &Outbound, cemi: &[u8]) -> Result<()> {
        let request = TunnelingRequest::new(
            ConnectionHeader::new(target.channel_id, target.sequence),
            cemi,
        );
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = request.build(&mut buf)?;
        sim_log!(
            debug,
            "{}: -> ch={} seq={} to {} ({} bytes)",
            self.name,
            target.channel_id,
            target.sequence,
            target.client,
            len
        );
        self.transport.send_to(&buf[..len], target.client)
    }
}

impl<T: Transport> Drop for TunnelServer<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}
