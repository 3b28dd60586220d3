//! Datagram transport to the controller
//!
//! The controller speaks an unframed request/response protocol with no
//! request ids. A reply can only be attributed to its request if no other
//! exchange interleaves, so every exchange goes through one [`Link`] which
//! holds a lock across send, receive, and the settle delay.

pub mod simulated;
pub mod udp;

pub use simulated::{SimulatedConfig, SimulatedHandle, SimulatedTransport};
pub use udp::HardwareTransport;

use crate::firmware::tvm920::command_creator::{self, OP_STATUS};
use crate::firmware::tvm920::status_parser::SharedStatusCache;
use parking_lot::Mutex;
use std::thread;
use std::time::Duration;
use tvmkit_core::ConnectionError;

/// Raw datagram I/O with one fixed peer
pub trait Transport: Send {
    /// Send one datagram
    fn send(&mut self, datagram: &[u8]) -> Result<(), ConnectionError>;

    /// Wait up to `timeout` for one datagram
    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, ConnectionError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Timing of one request/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// How long to wait for a reply
    pub read_timeout: Duration,
    /// Pause before releasing the link lock
    pub settle_in_lock: Duration,
    /// Pause after releasing the link lock
    pub settle_after_lock: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            settle_in_lock: Duration::from_millis(3),
            settle_after_lock: Duration::from_millis(2),
        }
    }
}

impl LinkTiming {
    /// No settle delays, for in-process transports
    pub fn immediate(read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            settle_in_lock: Duration::ZERO,
            settle_after_lock: Duration::ZERO,
        }
    }
}

/// Serialized request/response channel plus the status it keeps current
pub struct Link {
    transport: Mutex<Box<dyn Transport>>,
    status: SharedStatusCache,
    timing: LinkTiming,
    name: String,
}

impl Link {
    /// Wrap a transport
    pub fn new(transport: Box<dyn Transport>, timing: LinkTiming) -> Self {
        let name = transport.name().to_string();
        Self {
            transport: Mutex::new(transport),
            status: SharedStatusCache::new(),
            timing,
            name,
        }
    }

    /// Transport name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exchange timing
    pub fn timing(&self) -> LinkTiming {
        self.timing
    }

    /// Send `datagram` and wait for its reply.
    ///
    /// A reply starting with the status opcode replaces the shared status.
    /// Failures are logged here and returned; none of them poison the link.
    pub fn send_receive(&self, datagram: &[u8]) -> Result<Vec<u8>, ConnectionError> {
        let result = {
            let mut transport = self.transport.lock();
            let result = transport
                .send(datagram)
                .and_then(|_| transport.receive(self.timing.read_timeout));

            match &result {
                Ok(reply) => {
                    if reply.first() == Some(&OP_STATUS) {
                        if let Err(e) = self.status.update(reply) {
                            tracing::warn!("{}: discarding status reply: {}", self.name, e);
                        }
                    }
                }
                Err(e) => {
                    let opcode = datagram.first().copied().unwrap_or_default();
                    tracing::debug!(
                        "{}: exchange for opcode 0x{:02X} failed: {}",
                        self.name,
                        opcode,
                        e
                    );
                }
            }

            sleep_nonzero(self.timing.settle_in_lock);
            result
        };
        sleep_nonzero(self.timing.settle_after_lock);
        result
    }

    /// Ask the controller for its status. Returns whether a new status was
    /// accepted into the cache.
    pub fn request_status(&self) -> bool {
        let before = self.status.generation();
        let _ = self.send_receive(&command_creator::status_request());
        self.status.generation() > before
    }

    /// The shared status cache
    pub fn status(&self) -> &SharedStatusCache {
        &self.status
    }

    /// Time since the last accepted status
    pub fn status_age(&self) -> Option<Duration> {
        self.status.status_age()
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("generation", &self.status.generation())
            .finish()
    }
}

fn sleep_nonzero(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::tvm920::status_parser::{StatusBuilder, TickChannel};
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct CannedTransport {
        replies: VecDeque<Result<Vec<u8>, ConnectionError>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for CannedTransport {
        fn send(&mut self, datagram: &[u8]) -> Result<(), ConnectionError> {
            self.sent.lock().push(datagram.to_vec());
            Ok(())
        }

        fn receive(&mut self, _timeout: Duration) -> Result<Vec<u8>, ConnectionError> {
            self.replies
                .pop_front()
                .unwrap_or(Err(ConnectionError::Timeout { timeout_ms: 1 }))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn link(replies: Vec<Result<Vec<u8>, ConnectionError>>) -> (Link, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = CannedTransport {
            replies: replies.into(),
            sent: sent.clone(),
        };
        (
            Link::new(Box::new(transport), LinkTiming::immediate(Duration::from_millis(1))),
            sent,
        )
    }

    #[test]
    fn test_status_reply_updates_cache() {
        let status = StatusBuilder::new(64).ticks(TickChannel::X, 77).build();
        let (link, sent) = link(vec![Ok(status)]);

        assert!(link.request_status());
        assert_eq!(sent.lock()[0], vec![0, 0, 0, 0]);
        assert_eq!(link.status().message().ticks(TickChannel::X), 77);
        assert!(link.status_age().is_some());
    }

    #[test]
    fn test_non_status_reply_leaves_cache() {
        let (link, _) = link(vec![Ok(vec![0x0C, 0, 1, 0])]);
        let reply = link.send_receive(&[0x0C, 0, 1, 0]).unwrap();
        assert_eq!(reply, vec![0x0C, 0, 1, 0]);
        assert_eq!(link.status().generation(), 0);
    }

    #[test]
    fn test_timeout_is_status_unknown() {
        let (link, _) = link(vec![]);
        assert!(!link.request_status());
        assert!(link.status().message().is_all_stopped());
        assert!(link.status_age().is_none());
    }

    #[test]
    fn test_short_status_is_discarded() {
        let (link, _) = link(vec![Ok(vec![0u8; 8])]);
        assert!(!link.request_status());
        assert_eq!(link.status().generation(), 0);
    }
}
