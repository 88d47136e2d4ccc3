//! End-to-end tests over loopback UDP.
//!
//! Each test starts a premise on `127.0.0.1` with an ephemeral port and talks
//! to it with a plain `UdpSocket`, the way a tunnelling client would.

use knx_sim::configuration::{PremiseConfig, SimConfig};
use knx_sim::dpt::DptValue;
use knx_sim::inspector::TelegramInspector;
use knx_sim::protocol::{
    CEMIMessageCode, CemiFrame, ChannelRequest, ChannelResponse, ConnectRequest, ConnectResponse,
    ConnectionHeader, Hpai, KnxnetIpFrame, ServiceType, TunnelingAck, TunnelingRequest,
    E_CONNECTION_ID, E_NO_ERROR,
};
use knx_sim::{ga, ia, Premise};
use pretty_assertions::assert_eq;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
    [[premises]]
    id = "it"
    bind = "127.0.0.1"
    port = 0

    [[premises.devices]]
    id = "light-1"
    type = "light_switch"
    individual_address = "1.1.1"
    group_addresses = { switch_cmd = "1/0/1", switch_status = "1/0/2" }
"#;

struct Client {
    socket: UdpSocket,
    server: SocketAddr,
}

impl Client {
    fn new(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
        Self { socket, server }
    }

    fn send(&self, datagram: &[u8]) {
        self.socket.send_to(datagram, self.server).unwrap();
    }

    fn receive(&self) -> (ServiceType, Vec<u8>) {
        let mut buf = [0u8; 512];
        let (n, from) = self.socket.recv_from(&mut buf).unwrap();
        assert_eq!(from, self.server);
        let frame = KnxnetIpFrame::parse(&buf[..n]).unwrap();
        (frame.service_type(), frame.body().to_vec())
    }

    fn expect(&self, service: ServiceType) -> Vec<u8> {
        let (received, body) = self.receive();
        assert_eq!(received, service);
        body
    }

    fn connect(&self) -> ConnectResponse {
        let mut buf = [0u8; 64];
        let len = ConnectRequest::new(Hpai::UNSPECIFIED, Hpai::UNSPECIFIED)
            .build(&mut buf)
            .unwrap();
        self.send(&buf[..len]);
        ConnectResponse::parse(&self.expect(ServiceType::ConnectResponse)).unwrap()
    }

    fn channel_request(&self, service: ServiceType, reply: ServiceType, channel_id: u8) -> ChannelResponse {
        let mut buf = [0u8; 64];
        let len = ChannelRequest::new(channel_id, Hpai::UNSPECIFIED)
            .build(service, &mut buf)
            .unwrap();
        self.send(&buf[..len]);
        ChannelResponse::parse(&self.expect(reply)).unwrap()
    }

    fn disconnect(&self, channel_id: u8) -> ChannelResponse {
        self.channel_request(
            ServiceType::DisconnectRequest,
            ServiceType::DisconnectResponse,
            channel_id,
        )
    }

    fn tunnel(&self, channel_id: u8, seq: u8, frame: &CemiFrame) {
        let cemi = frame.to_bytes().unwrap();
        let mut buf = [0u8; 64];
        let len = TunnelingRequest::new(ConnectionHeader::new(channel_id, seq), &cemi)
            .build(&mut buf)
            .unwrap();
        self.send(&buf[..len]);
    }

    /// Receive a server TUNNELLING_REQUEST and acknowledge it
    fn receive_telegram(&self) -> (ConnectionHeader, CemiFrame) {
        let body = self.expect(ServiceType::TunnellingRequest);
        let request = TunnelingRequest::parse(&body).unwrap();
        let header = request.connection_header;
        let frame = CemiFrame::parse(request.cemi_data).unwrap();

        let mut buf = [0u8; 16];
        let len = TunnelingAck::new(header.channel_id, header.sequence_counter, E_NO_ERROR)
            .build(&mut buf)
            .unwrap();
        self.send(&buf[..len]);
        (header, frame)
    }
}

fn start() -> (Premise, Client) {
    let config = SimConfig::from_toml(CONFIG).unwrap();
    let mut premise = Premise::new(config.premises[0].clone()).unwrap();
    let addr = premise.start().unwrap();
    (premise, Client::new(addr))
}

fn switch_write(value: u8) -> CemiFrame {
    CemiFrame::group_write(ia!(1, 0, 255), ga!(1 / 0 / 1), &[value])
        .unwrap()
        .with_message_code(CEMIMessageCode::LDataReq)
}

#[test]
fn test_connect_write_disconnect() {
    let (mut premise, client) = start();

    let connected = client.connect();
    assert!(connected.is_ok());
    assert_eq!(connected.channel_id, 1);
    assert_eq!(connected.individual_address, ia!(1, 0, 255));

    client.tunnel(1, 0, &switch_write(0x01));
    let ack = TunnelingAck::parse(&client.expect(ServiceType::TunnellingAck)).unwrap();
    assert!(ack.is_ok());
    assert_eq!(ack.connection_header.channel_id, 1);
    assert_eq!(ack.connection_header.sequence_counter, 0);

    let (header, response) = client.receive_telegram();
    assert_eq!(header.channel_id, 1);
    assert_eq!(header.sequence_counter, 0);
    assert!(response.is_group_response());
    assert_eq!(response.group_address(), Some(ga!(1 / 0 / 2)));
    assert_eq!(response.source, ia!(1, 1, 1));
    assert_eq!(response.payload.as_slice(), &[0x01]);
    assert_eq!(premise.device_states()["light-1"]["on"], DptValue::Bool(true));

    let state = client.channel_request(
        ServiceType::ConnectionstateRequest,
        ServiceType::ConnectionstateResponse,
        1,
    );
    assert!(state.is_ok());

    assert!(client.disconnect(1).is_ok());
    assert!(premise.channels().is_empty());
    assert_eq!(client.disconnect(1).status, E_CONNECTION_ID);

    // The freed id is handed out again
    assert_eq!(client.connect().channel_id, 1);

    premise.stop();
    assert!(!premise.is_running());
}

#[test]
fn test_read_and_sequence_numbers() {
    let (mut premise, client) = start();
    let channel = client.connect().channel_id;

    for seq in 0..3u8 {
        let read = CemiFrame::group_read(ia!(1, 0, 255), ga!(1 / 0 / 1))
            .with_message_code(CEMIMessageCode::LDataReq);
        client.tunnel(channel, seq, &read);
        let ack = TunnelingAck::parse(&client.expect(ServiceType::TunnellingAck)).unwrap();
        assert_eq!(ack.connection_header.sequence_counter, seq);

        let (header, response) = client.receive_telegram();
        assert_eq!(header.sequence_counter, seq);
        assert_eq!(response.group_address(), Some(ga!(1 / 0 / 1)));
        assert_eq!(response.payload.as_slice(), &[0x00]);
    }

    let channels = premise.channels();
    assert_eq!(channels[0].recv_seq, 3);
    assert_eq!(channels[0].send_seq, 3);
    premise.stop();
}

#[test]
fn test_device_update_reaches_client() {
    let (mut premise, client) = start();
    let inspector = Arc::new(TelegramInspector::default());
    premise.subscribe(inspector.observer());
    let channel = client.connect().channel_id;

    assert_eq!(premise.update_device("light-1", "on", DptValue::Bool(true)).unwrap(), 1);
    let (header, indication) = client.receive_telegram();
    assert_eq!(header.channel_id, channel);
    assert!(indication.is_group_write());
    assert_eq!(indication.group_address(), Some(ga!(1 / 0 / 2)));

    let history = inspector.history("it", 10, 0);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].direction, "tx");
    assert_eq!(history[0].device_id.as_deref(), Some("light-1"));
    premise.stop();
}

#[test]
fn test_two_premises_are_isolated() {
    let mut a = Premise::new(PremiseConfig {
        bind: "127.0.0.1".into(),
        port: 0,
        ..PremiseConfig::new("a")
    })
    .unwrap();
    let mut b = Premise::new(PremiseConfig {
        bind: "127.0.0.1".into(),
        port: 0,
        ..PremiseConfig::new("b")
    })
    .unwrap();
    let addr_a = a.start().unwrap();
    let addr_b = b.start().unwrap();
    assert_ne!(addr_a, addr_b);

    let client = Client::new(addr_a);
    assert_eq!(client.connect().channel_id, 1);
    assert_eq!(a.channels().len(), 1);
    assert!(b.channels().is_empty());

    a.stop();
    b.stop();
}
