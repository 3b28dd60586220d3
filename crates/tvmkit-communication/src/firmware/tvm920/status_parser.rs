//! TVM920 Status Message Parsing
//!
//! The controller answers a status request with a fixed binary layout:
//! per-axis busy flags, 24-bit little-endian signed tick counts, and a
//! home-switch bitfield. This module decodes that layout and owns the
//! shared "last status" cache that every thread consults.

use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tvmkit_core::{thread_safe_rw, HeadIndex, HeadPair, ProtocolError, ThreadSafeRw};

/// Smallest status datagram that carries every field we read
pub const STATUS_MIN_LEN: usize = 0x34;

const HOME_FLAGS: usize = 0x08;
const Z01_HOME_BIT: u8 = 0x20;
const Z23_HOME_BIT: u8 = 0x40;

const THETA_TICKS: [usize; 4] = [0x05, 0x09, 0x0D, 0x11];
const Z01_TICKS: usize = 0x1D;
const Z23_TICKS: usize = 0x21;
const Y_TICKS: usize = 0x25;
const X_TICKS: usize = 0x29;

const THETA_BUSY: [usize; 4] = [0x2C, 0x2D, 0x2E, 0x2F];
const Z01_BUSY: usize = 0x30;
const Z23_BUSY: usize = 0x31;
const Y_BUSY: usize = 0x32;
const X_BUSY: usize = 0x33;

/// Tick counter reported in the status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickChannel {
    /// Gantry X
    X,
    /// Gantry Y
    Y,
    /// Shared rotary Z drive of a head pair
    Z(HeadPair),
    /// Rotation of one head
    Theta(HeadIndex),
}

impl TickChannel {
    fn offset(self) -> usize {
        match self {
            TickChannel::X => X_TICKS,
            TickChannel::Y => Y_TICKS,
            TickChannel::Z(HeadPair::Z01) => Z01_TICKS,
            TickChannel::Z(HeadPair::Z23) => Z23_TICKS,
            TickChannel::Theta(head) => THETA_TICKS[head.get()],
        }
    }
}

/// Decode a 24-bit little-endian signed field starting at `offset`.
///
/// The three wire bytes are placed in the top of an `i32` and shifted back
/// arithmetically so the sign of the top byte is preserved.
pub fn decode_ticks(bytes: &[u8], offset: usize) -> i32 {
    match bytes.get(offset..offset + 3) {
        Some(field) => i32::from_le_bytes([0, field[0], field[1], field[2]]) >> 8,
        None => 0,
    }
}

/// Encode the low 24 bits of `ticks` little-endian
pub fn encode_ticks(ticks: i32) -> [u8; 3] {
    let le = ticks.to_le_bytes();
    [le[0], le[1], le[2]]
}

/// A decoded status datagram.
///
/// Always at least [`STATUS_MIN_LEN`] bytes long, so accessors never index
/// out of bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    bytes: Vec<u8>,
}

impl StatusMessage {
    /// Decode a raw status datagram
    pub fn decode(buffer: &[u8]) -> Result<Self, ProtocolError> {
        if buffer.len() < STATUS_MIN_LEN {
            return Err(ProtocolError::StatusTooShort {
                len: buffer.len(),
                required: STATUS_MIN_LEN,
            });
        }
        Ok(Self {
            bytes: buffer.to_vec(),
        })
    }

    /// All-zero status: everything stopped, nothing home, all ticks zero
    pub fn neutral() -> Self {
        Self {
            bytes: vec![0; STATUS_MIN_LEN],
        }
    }

    /// Raw datagram
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// X and Y both idle
    pub fn is_xy_stopped(&self) -> bool {
        self.bytes[X_BUSY] == 0 && self.bytes[Y_BUSY] == 0
    }

    /// Both Z drives idle
    pub fn is_z_stopped(&self) -> bool {
        self.bytes[Z01_BUSY] == 0 && self.bytes[Z23_BUSY] == 0
    }

    /// All four theta drives idle
    pub fn is_theta_stopped(&self) -> bool {
        THETA_BUSY.iter().all(|&offset| self.bytes[offset] == 0)
    }

    /// Every axis idle
    pub fn is_all_stopped(&self) -> bool {
        self.is_xy_stopped() && self.is_z_stopped() && self.is_theta_stopped()
    }

    /// Raw tick count of one channel
    pub fn ticks(&self, channel: TickChannel) -> i32 {
        decode_ticks(&self.bytes, channel.offset())
    }

    /// Home switch of the Z01 drive
    pub fn is_z01_home(&self) -> bool {
        self.bytes[HOME_FLAGS] & Z01_HOME_BIT != 0
    }

    /// Home switch of the Z23 drive
    pub fn is_z23_home(&self) -> bool {
        self.bytes[HOME_FLAGS] & Z23_HOME_BIT != 0
    }

    /// Home switch of a head pair
    pub fn is_z_home(&self, pair: HeadPair) -> bool {
        match pair {
            HeadPair::Z01 => self.is_z01_home(),
            HeadPair::Z23 => self.is_z23_home(),
        }
    }
}

impl Default for StatusMessage {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Builder for status datagrams, used by the simulated controller and tests
#[derive(Debug, Clone)]
pub struct StatusBuilder {
    bytes: Vec<u8>,
}

impl StatusBuilder {
    /// Start from a neutral status of `len` bytes (at least the minimum)
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len.max(STATUS_MIN_LEN)],
        }
    }

    /// Set a tick counter
    pub fn ticks(mut self, channel: TickChannel, ticks: i32) -> Self {
        let offset = channel.offset();
        self.bytes[offset..offset + 3].copy_from_slice(&encode_ticks(ticks));
        self
    }

    /// Set the busy flag of a channel
    pub fn busy(mut self, channel: TickChannel, busy: bool) -> Self {
        let offset = match channel {
            TickChannel::X => X_BUSY,
            TickChannel::Y => Y_BUSY,
            TickChannel::Z(HeadPair::Z01) => Z01_BUSY,
            TickChannel::Z(HeadPair::Z23) => Z23_BUSY,
            TickChannel::Theta(head) => THETA_BUSY[head.get()],
        };
        self.bytes[offset] = u8::from(busy);
        self
    }

    /// Set a Z home switch
    pub fn z_home(mut self, pair: HeadPair, home: bool) -> Self {
        let bit = match pair {
            HeadPair::Z01 => Z01_HOME_BIT,
            HeadPair::Z23 => Z23_HOME_BIT,
        };
        if home {
            self.bytes[HOME_FLAGS] |= bit;
        } else {
            self.bytes[HOME_FLAGS] &= !bit;
        }
        self
    }

    /// Finish into the raw datagram
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Format a datagram as rows of 16 hex bytes
pub fn dump_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len() / 16 * 6);
    for (i, byte) in data.iter().enumerate() {
        if i % 16 == 0 {
            let _ = write!(out, "\n{:02X}  ", i / 16);
        } else if i % 8 == 0 {
            out.push_str("  ");
        }
        let _ = write!(out, "{:02x} ", byte);
    }
    out
}

/// Point-in-time copy of the shared status
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Most recently accepted status
    pub message: StatusMessage,
    /// Number of statuses accepted so far
    pub generation: u64,
    /// When the last status was accepted
    pub received_at: Option<Instant>,
}

/// The single "last status" shared by one link and everything driving it.
///
/// Last write wins. Each accepted datagram replaces the previous one
/// wholesale and bumps the generation counter.
#[derive(Debug, Clone)]
pub struct SharedStatusCache {
    inner: ThreadSafeRw<StatusSnapshot>,
}

impl SharedStatusCache {
    /// Create a cache holding the neutral status
    pub fn new() -> Self {
        Self {
            inner: thread_safe_rw(StatusSnapshot {
                message: StatusMessage::neutral(),
                generation: 0,
                received_at: None,
            }),
        }
    }

    /// Replace the cached status with a freshly received datagram.
    ///
    /// A datagram shorter than the layout leaves the cache untouched.
    pub fn update(&self, datagram: &[u8]) -> Result<u64, ProtocolError> {
        let message = StatusMessage::decode(datagram)?;
        let mut guard = self.inner.write();
        if guard.message != message {
            tracing::trace!("TVM920 status change:{}", dump_hex(message.as_bytes()));
        }
        guard.message = message;
        guard.generation += 1;
        guard.received_at = Some(Instant::now());
        Ok(guard.generation)
    }

    /// Copy of the current status and its bookkeeping
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    /// Copy of the current status message
    pub fn message(&self) -> StatusMessage {
        self.inner.read().message.clone()
    }

    /// Generation of the current status
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Time since the last accepted status, `None` if none ever arrived
    pub fn status_age(&self) -> Option<Duration> {
        self.inner.read().received_at.map(|at| at.elapsed())
    }
}

impl Default for SharedStatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(i: usize) -> HeadIndex {
        HeadIndex::new(i).unwrap()
    }

    #[test]
    fn test_decode_ticks_preserves_sign() {
        let bytes = [0xFF, 0xFF, 0xFF];
        assert_eq!(decode_ticks(&bytes, 0), -1);

        let bytes = [0x00, 0x00, 0x80];
        assert_eq!(decode_ticks(&bytes, 0), -8_388_608);

        let bytes = [0xFF, 0xFF, 0x7F];
        assert_eq!(decode_ticks(&bytes, 0), 8_388_607);

        let bytes = [0xE8, 0x03, 0x00];
        assert_eq!(decode_ticks(&bytes, 0), 1000);
    }

    #[test]
    fn test_decode_ticks_out_of_bounds_is_zero() {
        assert_eq!(decode_ticks(&[1, 2], 0), 0);
    }

    #[test]
    fn test_neutral_status_defaults() {
        let status = StatusMessage::neutral();
        assert!(status.is_all_stopped());
        assert!(!status.is_z01_home());
        assert!(!status.is_z23_home());
        assert_eq!(status.ticks(TickChannel::X), 0);
    }

    #[test]
    fn test_short_status_rejected() {
        let err = StatusMessage::decode(&[0u8; 0x20]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::StatusTooShort {
                len: 0x20,
                required: STATUS_MIN_LEN
            }
        );
    }

    #[test]
    fn test_field_offsets() {
        let datagram = StatusBuilder::new(128)
            .ticks(TickChannel::X, 1000)
            .ticks(TickChannel::Y, -2000)
            .ticks(TickChannel::Z(HeadPair::Z23), -533)
            .ticks(TickChannel::Theta(head(3)), 1600)
            .z_home(HeadPair::Z01, true)
            .busy(TickChannel::Theta(head(2)), true)
            .build();

        assert_eq!(&datagram[0x29..0x2C], &[0xE8, 0x03, 0x00]);
        assert_eq!(datagram[0x08], 0x20);
        assert_eq!(datagram[0x2E], 1);

        let status = StatusMessage::decode(&datagram).unwrap();
        assert_eq!(status.ticks(TickChannel::X), 1000);
        assert_eq!(status.ticks(TickChannel::Y), -2000);
        assert_eq!(status.ticks(TickChannel::Z(HeadPair::Z23)), -533);
        assert_eq!(status.ticks(TickChannel::Theta(head(3))), 1600);
        assert!(status.is_z01_home());
        assert!(!status.is_z23_home());
        assert!(status.is_xy_stopped());
        assert!(!status.is_theta_stopped());
        assert!(!status.is_all_stopped());
    }

    #[test]
    fn test_busy_predicates() {
        let status = StatusMessage::decode(
            &StatusBuilder::new(STATUS_MIN_LEN)
                .busy(TickChannel::Y, true)
                .build(),
        )
        .unwrap();
        assert!(!status.is_xy_stopped());
        assert!(status.is_z_stopped());

        let status = StatusMessage::decode(
            &StatusBuilder::new(STATUS_MIN_LEN)
                .busy(TickChannel::Z(HeadPair::Z01), true)
                .build(),
        )
        .unwrap();
        assert!(status.is_xy_stopped());
        assert!(!status.is_z_stopped());
    }

    #[test]
    fn test_cache_generation_and_short_datagram() {
        let cache = SharedStatusCache::new();
        assert_eq!(cache.generation(), 0);
        assert!(cache.status_age().is_none());

        let datagram = StatusBuilder::new(64).ticks(TickChannel::X, 42).build();
        assert_eq!(cache.update(&datagram).unwrap(), 1);
        assert_eq!(cache.message().ticks(TickChannel::X), 42);
        assert!(cache.status_age().is_some());

        assert!(cache.update(&[0u8; 4]).is_err());
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.message().ticks(TickChannel::X), 42);
    }

    #[test]
    fn test_dump_hex_layout() {
        let dump = dump_hex(&(0u8..18).collect::<Vec<_>>());
        let lines: Vec<&str> = dump.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00  00 01"));
        assert!(lines[0].contains("07   08"));
        assert!(lines[1].starts_with("01  10 11"));
    }
}
