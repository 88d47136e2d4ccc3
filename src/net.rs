//! Network plumbing for the tunnelling server.
//!
//! The server talks to a [`Transport`], never to a socket directly:
//! [`UdpTransport`] wraps a std `UdpSocket` and [`MockTransport`] records
//! datagrams in memory for tests.

pub mod mock_transport;
pub mod transport;
pub mod udp_transport;

pub use mock_transport::MockTransport;
pub use transport::Transport;
pub use udp_transport::UdpTransport;

use crate::error::{KnxError, Result};
use std::net::{IpAddr, SocketAddr};

/// Build the listen address of a premise from its `bind` text and port.
///
/// # Examples
///
/// ```
/// use knx_sim::net::listen_address;
///
/// let addr = listen_address("127.0.0.1", 3671).unwrap();
/// assert_eq!(addr.to_string(), "127.0.0.1:3671");
/// ```
///
/// # Errors
///
/// Returns a configuration error when `bind` is not an IP address.
pub fn listen_address(bind: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind
        .trim()
        .parse()
        .map_err(|_| KnxError::config_invalid(format!("invalid bind address '{bind}'")))?;
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_listen_address() {
        let addr = listen_address("0.0.0.0", 3671).unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 3671);
    }

    #[test]
    fn test_listen_address_ipv6() {
        let addr = listen_address("::1", 0).unwrap();
        assert!(addr.is_ipv6());
    }

    #[rstest]
    #[case("192.168.1")]
    #[case("192.168.1.256")]
    #[case("192.168.1.10.5")]
    #[case("a.b.c.d")]
    #[case("")]
    fn test_listen_address_invalid(#[case] bind: &str) {
        let err = listen_address(bind, 3671).unwrap_err();
        assert!(err.as_config().is_some_and(|e| e.is_invalid()));
    }
}
