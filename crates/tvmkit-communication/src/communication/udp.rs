//! UDP transport to a physical controller
//!
//! The controller answers from its fixed address to the port the request
//! came from, and the stock software always binds the same local port, so
//! both ends are configured explicitly.

use super::Transport;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tvmkit_core::ConnectionError;

/// Largest datagram the controller sends
const RECEIVE_BUFFER_LEN: usize = 1024;

/// UDP socket bound locally and aimed at one controller
#[derive(Debug)]
pub struct HardwareTransport {
    socket: UdpSocket,
    peer: SocketAddr,
    name: String,
    buffer: Vec<u8>,
}

impl HardwareTransport {
    /// Bind `local_port` on all interfaces and target `host:port`
    pub fn connect(host: &str, port: u16, local_port: u16) -> Result<Self, ConnectionError> {
        let peer = (host, port)
            .to_socket_addrs()
            .map_err(|e| ConnectionError::InvalidAddress {
                address: format!("{}:{}", host, port),
                reason: e.to_string(),
            })?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ConnectionError::InvalidAddress {
                address: format!("{}:{}", host, port),
                reason: "no IPv4 address".to_string(),
            })?;

        let socket =
            UdpSocket::bind(("0.0.0.0", local_port)).map_err(|e| ConnectionError::BindFailed {
                port: local_port,
                reason: e.to_string(),
            })?;

        tracing::info!(
            "TVM920 UDP transport bound to {} targeting {}",
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| format!("port {}", local_port)),
            peer
        );

        Ok(Self {
            socket,
            peer,
            name: format!("udp:{}", peer),
            buffer: vec![0; RECEIVE_BUFFER_LEN],
        })
    }

    /// Controller address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Drop replies that arrived after their request timed out, so the
    /// next receive answers the next send.
    fn discard_pending(&mut self) -> Result<(), ConnectionError> {
        let to_error = |e: io::Error| ConnectionError::SendFailed {
            reason: e.to_string(),
        };
        self.socket.set_nonblocking(true).map_err(to_error)?;
        let drained = loop {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((len, from)) => {
                    tracing::debug!("Discarding stale {} byte datagram from {}", len, from);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.socket.set_nonblocking(false).map_err(to_error)?;
        drained.map_err(to_error)
    }
}

impl Transport for HardwareTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), ConnectionError> {
        self.discard_pending()?;
        self.socket
            .send_to(datagram, self.peer)
            .map(|_| ())
            .map_err(|e| ConnectionError::SendFailed {
                reason: e.to_string(),
            })
    }

    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, ConnectionError> {
        // A zero read timeout is rejected by the socket API.
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| ConnectionError::ReceiveFailed {
                reason: e.to_string(),
            })?;

        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, from)) => {
                if from.ip() != self.peer.ip() {
                    tracing::debug!("Datagram from unexpected peer {}", from);
                }
                Ok(self.buffer[..len].to_vec())
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(ConnectionError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(e) => Err(ConnectionError::ReceiveFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address() {
        let err = HardwareTransport::connect("not an address", 8701, 0).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
    }

    #[test]
    fn test_loopback_exchange() {
        let controller = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = controller.local_addr().unwrap().port();
        let mut transport = HardwareTransport::connect("127.0.0.1", port, 0).unwrap();

        transport.send(&[0, 0, 0, 0]).unwrap();
        let mut buf = [0u8; 16];
        let (len, from) = controller.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[0, 0, 0, 0]);

        controller.send_to(&[0x0C, 0, 1, 0], from).unwrap();
        let reply = transport.receive(Duration::from_millis(500)).unwrap();
        assert_eq!(reply, vec![0x0C, 0, 1, 0]);
    }

    #[test]
    fn test_late_reply_is_discarded() {
        let controller = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = controller.local_addr().unwrap().port();
        let mut transport = HardwareTransport::connect("127.0.0.1", port, 0).unwrap();

        transport.send(&[1]).unwrap();
        let mut buf = [0u8; 16];
        let (_, from) = controller.recv_from(&mut buf).unwrap();
        assert!(transport.receive(Duration::from_millis(5)).is_err());

        // The first reply shows up after its request gave up
        controller.send_to(&[0xAA], from).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        transport.send(&[2]).unwrap();
        let (len, _) = controller.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[2]);
        controller.send_to(&[0xBB], from).unwrap();

        let reply = transport.receive(Duration::from_millis(500)).unwrap();
        assert_eq!(reply, vec![0xBB]);
    }

    #[test]
    fn test_receive_timeout() {
        let controller = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = controller.local_addr().unwrap().port();
        let mut transport = HardwareTransport::connect("127.0.0.1", port, 0).unwrap();

        let err = transport.receive(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout { .. }));
    }
}
