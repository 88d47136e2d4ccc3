//! Datagram transport abstraction.
//!
//! The tunnelling server is generic over [`Transport`] so the protocol logic
//! can be driven either by a real UDP socket or by an in-memory mock:
//!
//! ```rust,no_run
//! use knx_sim::net::{MockTransport, Transport, UdpTransport};
//! use std::time::Duration;
//!
//! // Production: a bound UDP socket polled once per second
//! let udp = UdpTransport::bind("0.0.0.0:3671".parse().unwrap(), Duration::from_secs(1)).unwrap();
//!
//! // Tests: queued datagrams, recorded replies
//! let mock = MockTransport::new();
//! mock.add_datagram(vec![0x06, 0x10, 0x02, 0x05], "192.168.1.20:50000".parse().unwrap());
//! ```

use crate::error::Result;
use std::net::SocketAddr;

/// Connectionless datagram transport.
///
/// Methods take `&self`: one receive thread polls [`recv_from`] while
/// scenario threads send through the same transport.
///
/// [`recv_from`]: Transport::recv_from
pub trait Transport: Send + Sync {
    /// Send one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the datagram could not be sent.
    fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()>;

    /// Wait for one datagram.
    ///
    /// Returns `Ok(None)` when the poll interval elapses without data, so
    /// the caller can check its shutdown flag.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the underlying socket fails.
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    /// Address the transport is bound to.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the address cannot be queried.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Check if the transport can carry traffic.
    ///
    /// Default implementation returns `true`.
    fn is_ready(&self) -> bool {
        true
    }

    /// Stop carrying traffic. Default implementation does nothing.
    fn close(&self) {}
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        (**self).send_to(data, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        (**self).recv_from(buf)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        (**self).local_addr()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn close(&self) {
        (**self).close();
    }
}
