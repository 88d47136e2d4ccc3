//! Mock transport implementation for testing.
//!
//! [`MockTransport`] lets the tunnelling server run without a socket:
//! datagrams queued with [`add_datagram`](MockTransport::add_datagram) are
//! handed out by `recv_from()` in FIFO order, and everything passed to
//! `send_to()` is recorded for inspection.
//!
//! ## Example
//!
//! ```rust
//! use knx_sim::net::{MockTransport, Transport};
//!
//! let mock = MockTransport::new();
//! let client = "192.168.1.20:50000".parse().unwrap();
//! mock.add_datagram(vec![0x06, 0x10, 0x02, 0x09], client);
//!
//! let mut buf = [0u8; 64];
//! let (n, from) = mock.recv_from(&mut buf).unwrap().unwrap();
//! assert_eq!(n, 4);
//! assert_eq!(from, client);
//!
//! mock.send_to(&[0x06, 0x10, 0x02, 0x0A], client).unwrap();
//! assert_eq!(mock.sent_packets().len(), 1);
//! ```

use crate::error::Result;
use crate::net::Transport;
use crate::utility::lock;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Address the mock reports as bound
const MOCK_LOCAL: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 3671));

/// In-memory transport.
///
/// - Queued datagrams are returned by `recv_from()`; an empty queue behaves
///   like a poll timeout.
/// - Sent datagrams are recorded with their destination.
#[derive(Debug)]
pub struct MockTransport {
    inbound: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    ready: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a ready mock with nothing queued
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
        }
    }

    /// Queue a datagram from `from` for the next `recv_from()` call
    pub fn add_datagram(&self, data: Vec<u8>, from: SocketAddr) {
        lock(&self.inbound).push_back((data, from));
    }

    /// Copy of every datagram sent so far, oldest first
    pub fn sent_packets(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        lock(&self.sent).clone()
    }

    /// Remove and return everything sent so far
    pub fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Last datagram sent, if any
    pub fn last_sent(&self) -> Option<(Vec<u8>, SocketAddr)> {
        lock(&self.sent).last().cloned()
    }

    /// Clear the send history
    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }

    /// Number of queued datagrams not yet received
    pub fn pending_datagrams(&self) -> usize {
        lock(&self.inbound).len()
    }

    /// Set whether the transport reports as ready
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

impl Transport for MockTransport {
    fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        lock(&self.sent).push((data.to_vec(), addr));
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        let Some((data, from)) = lock(&self.inbound).pop_front() else {
            return Ok(None);
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, from)))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(MOCK_LOCAL)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.ready.store(false, Ordering::Relaxed);
        lock(&self.inbound).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> SocketAddr {
        "192.168.1.20:50000".parse().unwrap()
    }

    #[test]
    fn test_mock_send_receive() {
        let mock = MockTransport::new();
        mock.add_datagram(vec![0x01, 0x02, 0x03], client());
        mock.send_to(&[0xAA, 0xBB], client()).unwrap();

        assert_eq!(mock.sent_packets(), vec![(vec![0xAA, 0xBB], client())]);

        let mut buf = [0u8; 10];
        let (n, from) = mock.recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], &[0x01, 0x02, 0x03]);
        assert_eq!(from, client());
    }

    #[test]
    fn test_mock_empty_queue_is_timeout() {
        let mock = MockTransport::new();
        let mut buf = [0u8; 10];
        assert!(mock.recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_mock_fifo_order() {
        let mock = MockTransport::new();
        mock.add_datagram(vec![0x01], client());
        mock.add_datagram(vec![0x02], client());
        mock.add_datagram(vec![0x03], client());
        assert_eq!(mock.pending_datagrams(), 3);

        let mut buf = [0u8; 10];
        for expected in 1..=3u8 {
            mock.recv_from(&mut buf).unwrap().unwrap();
            assert_eq!(buf[0], expected);
        }
    }

    #[test]
    fn test_mock_take_sent() {
        let mock = MockTransport::new();
        mock.send_to(&[0x01], client()).unwrap();
        mock.send_to(&[0x02], client()).unwrap();
        assert_eq!(mock.last_sent().unwrap().0, vec![0x02]);
        assert_eq!(mock.take_sent().len(), 2);
        assert!(mock.sent_packets().is_empty());
    }

    #[test]
    fn test_mock_ready_state() {
        let mock = MockTransport::new();
        assert!(mock.is_ready());

        mock.set_ready(false);
        assert!(!mock.is_ready());

        mock.set_ready(true);
        mock.add_datagram(vec![0x01], client());
        mock.close();
        assert!(!mock.is_ready());
        assert_eq!(mock.pending_datagrams(), 0);
    }
}
