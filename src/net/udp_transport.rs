//! [`Transport`] over a std `UdpSocket`.

use crate::error::{KnxError, Result};
use crate::net::Transport;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// UDP socket with a read timeout used as the poll interval
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    open: AtomicBool,
}

impl UdpTransport {
    /// Bind `addr`; `recv_from` returns `None` after `poll` without data.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the address is in use or the timeout
    /// cannot be set.
    pub fn bind(addr: SocketAddr, poll: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(KnxError::bind_failed)?;
        socket
            .set_read_timeout(Some(poll))
            .map_err(KnxError::bind_failed)?;
        Ok(Self {
            socket,
            open: AtomicBool::new(true),
        })
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, addr)
            .map_err(KnxError::send_failed)?;
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            // ICMP port unreachable from an earlier send surfaces here on some platforms
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock
                        | ErrorKind::TimedOut
                        | ErrorKind::Interrupted
                        | ErrorKind::ConnectionReset
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(KnxError::receive_failed(e)),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(KnxError::bind_failed)
    }

    fn is_ready(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loopback() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(50)).unwrap()
    }

    #[test]
    fn test_send_and_receive() {
        let a = loopback();
        let b = loopback();
        a.send_to(&[0x06, 0x10], b.local_addr().unwrap()).unwrap();

        let mut buf = [0u8; 16];
        let mut received = None;
        for _ in 0..20 {
            if let Some(r) = b.recv_from(&mut buf).unwrap() {
                received = Some(r);
                break;
            }
        }
        let (n, from) = received.unwrap();
        assert_eq!(&buf[..n], &[0x06, 0x10]);
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn test_poll_timeout_is_none() {
        let transport = loopback();
        let mut buf = [0u8; 16];
        assert!(transport.recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_bind_in_use() {
        let first = loopback();
        let err = UdpTransport::bind(first.local_addr().unwrap(), Duration::from_millis(50)).unwrap_err();
        assert!(err.as_transport().is_some_and(|e| e.is_bind_failed()));
    }

    #[test]
    fn test_close() {
        let transport = loopback();
        assert!(transport.is_ready());
        transport.close();
        assert!(!transport.is_ready());
    }
}
