//! TVM920 command datagrams
//!
//! Byte-exact builders for every request the driver sends. Layouts are
//! fixed by the controller firmware; multi-byte fields are little-endian.

use super::status_parser::{decode_ticks, encode_ticks, TickChannel};
use tvmkit_core::{ControllerError, HeadIndex, HeadPair};

/// Status request / status reply marker
pub const OP_STATUS: u8 = 0x00;
/// Generic register read/write
pub const OP_REGISTER: u8 = 0x01;
/// Register query used during initialisation
pub const OP_REGISTER_QUERY: u8 = 0x02;
/// Feeder solenoid bitmask
pub const OP_FEEDER: u8 = 0x05;
/// Speed table load
pub const OP_SPEED_TABLE: u8 = 0x07;
/// Position set
pub const OP_SET_POSITION: u8 = 0x08;
/// Motion enable/disable
pub const OP_MOTION_ENABLE: u8 = 0x0C;
/// Move
pub const OP_MOVE: u8 = 0x0D;
/// GPIO set
pub const OP_GPIO_SET: u8 = 0x16;
/// GPIO clear
pub const OP_GPIO_CLEAR: u8 = 0x17;

/// Length of move and position-set datagrams
pub const MOVE_LEN: usize = 36;
/// Length of the feeder datagram
pub const FEEDER_LEN: usize = 12;
/// Highest front feeder index
pub const MAX_FEEDER_INDEX: usize = 27;

/// Register holding the front panel lock
pub const REG_FRONT_PANEL: u16 = 0x10F4;
/// End-stop enable register for Z
pub const REG_ENDSTOP_Z: u16 = 0x1F4;
/// End-stop enable register for Y
pub const REG_ENDSTOP_Y: u16 = 0x1F5;
/// End-stop enable register for X
pub const REG_ENDSTOP_X: u16 = 0x1F6;
/// Value written to an end-stop register to release it
pub const ENDSTOP_DISABLED: u32 = 0x0100_0000;

/// GPIO bit of the down-looking camera light
pub const GPIO_DOWN_LIGHT: u32 = 0x0080;
/// GPIO bit of the up-looking camera light
pub const GPIO_UP_LIGHT: u32 = 0x0100;
/// GPIO bits of all four pick valves
pub const GPIO_ALL_PICKS: u32 = 0x000F;

const MASK_X: u8 = 0x80;
const MASK_Y: u8 = 0x40;
const MASK_Z23: u8 = 0x20;
const MASK_Z01: u8 = 0x10;
const MASK_THETA: [u8; 4] = [0x01, 0x02, 0x04, 0x08];

const THETA_FIELD: [usize; 4] = [0x05, 0x09, 0x0D, 0x11];
const Z01_FIELD: usize = 0x15;
const Z23_FIELD: usize = 0x19;
const Y_FIELD: usize = 0x1D;
const X_FIELD: usize = 0x21;

/// Builder for the 36-byte axis datagrams (move and position set).
///
/// Byte 2 carries the axis-select mask; each selected axis has a 24-bit
/// tick field at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisCommand {
    bytes: [u8; MOVE_LEN],
}

impl AxisCommand {
    /// Start a move datagram with nothing selected
    pub fn movement() -> Self {
        Self::with_opcode(OP_MOVE)
    }

    /// Start a position-set datagram with nothing selected
    pub fn set_position() -> Self {
        Self::with_opcode(OP_SET_POSITION)
    }

    fn with_opcode(opcode: u8) -> Self {
        let mut bytes = [0u8; MOVE_LEN];
        bytes[0] = opcode;
        Self { bytes }
    }

    fn put(&mut self, mask: u8, offset: usize, ticks: i32) {
        self.bytes[2] |= mask;
        self.bytes[offset..offset + 3].copy_from_slice(&encode_ticks(ticks));
    }

    /// Select X with a tick target
    pub fn x(mut self, ticks: i32) -> Self {
        self.put(MASK_X, X_FIELD, ticks);
        self
    }

    /// Select Y with a tick target
    pub fn y(mut self, ticks: i32) -> Self {
        self.put(MASK_Y, Y_FIELD, ticks);
        self
    }

    /// Select one head pair's Z drive with a tick target
    pub fn z(mut self, pair: HeadPair, ticks: i32) -> Self {
        match pair {
            HeadPair::Z01 => self.put(MASK_Z01, Z01_FIELD, ticks),
            HeadPair::Z23 => self.put(MASK_Z23, Z23_FIELD, ticks),
        }
        self
    }

    /// Select one head's theta with a tick target
    pub fn theta(mut self, head: HeadIndex, ticks: i32) -> Self {
        self.put(MASK_THETA[head.get()], THETA_FIELD[head.get()], ticks);
        self
    }

    /// Parse a received move or position-set datagram
    pub fn decode(datagram: &[u8]) -> Option<Self> {
        let opcode = *datagram.first()?;
        if datagram.len() < MOVE_LEN || (opcode != OP_MOVE && opcode != OP_SET_POSITION) {
            return None;
        }
        let mut bytes = [0u8; MOVE_LEN];
        bytes.copy_from_slice(&datagram[..MOVE_LEN]);
        Some(Self { bytes })
    }

    /// Opcode, move or position set
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Selected channels and their tick targets
    pub fn targets(&self) -> Vec<(TickChannel, i32)> {
        let mask = self.bytes[2];
        let mut targets = Vec::new();
        for head in HeadIndex::all() {
            if mask & MASK_THETA[head.get()] != 0 {
                let ticks = decode_ticks(&self.bytes, THETA_FIELD[head.get()]);
                targets.push((TickChannel::Theta(head), ticks));
            }
        }
        if mask & MASK_Z01 != 0 {
            let ticks = decode_ticks(&self.bytes, Z01_FIELD);
            targets.push((TickChannel::Z(HeadPair::Z01), ticks));
        }
        if mask & MASK_Z23 != 0 {
            let ticks = decode_ticks(&self.bytes, Z23_FIELD);
            targets.push((TickChannel::Z(HeadPair::Z23), ticks));
        }
        if mask & MASK_Y != 0 {
            targets.push((TickChannel::Y, decode_ticks(&self.bytes, Y_FIELD)));
        }
        if mask & MASK_X != 0 {
            targets.push((TickChannel::X, decode_ticks(&self.bytes, X_FIELD)));
        }
        targets
    }

    /// Axis-select mask
    pub fn mask(&self) -> u8 {
        self.bytes[2]
    }

    /// Finished datagram
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Status request
pub fn status_request() -> [u8; 4] {
    [OP_STATUS, 0, 0, 0]
}

/// Motion enable (`true`) or the safety lockout (`false`)
pub fn motion_enable(enable: bool) -> [u8; 4] {
    [OP_MOTION_ENABLE, 0, u8::from(enable), 0]
}

/// Open one front feeder. Index 0..=27.
pub fn feeder_open(index: usize) -> Result<[u8; FEEDER_LEN], ControllerError> {
    if index > MAX_FEEDER_INDEX {
        return Err(ControllerError::invalid_argument(format!(
            "feeder index {} out of range 0..={}",
            index, MAX_FEEDER_INDEX
        )));
    }
    let mut data = feeders_close_all();
    data[10 - index / 8] = 1 << (index % 8);
    Ok(data)
}

/// Close every feeder
pub fn feeders_close_all() -> [u8; FEEDER_LEN] {
    let mut data = [0u8; FEEDER_LEN];
    data[0] = OP_FEEDER;
    data
}

/// GPIO set or clear of `mask`
pub fn gpio(set: bool, mask: u32) -> [u8; 8] {
    let mut data = [0u8; 8];
    data[0] = if set { OP_GPIO_SET } else { OP_GPIO_CLEAR };
    data[4..8].copy_from_slice(&mask.to_le_bytes());
    data
}

/// GPIO mask of one pick valve. Index 0..=3.
pub fn pick_mask(index: usize) -> Result<u32, ControllerError> {
    let head = HeadIndex::new(index).map_err(|_| {
        ControllerError::invalid_argument(format!("pick index {} out of range 0..=3", index))
    })?;
    Ok(1 << head.get())
}

/// Register read request
pub fn register_read(register: u16) -> [u8; 12] {
    let mut data = [0u8; 12];
    data[0] = OP_REGISTER;
    data[4..6].copy_from_slice(&register.to_le_bytes());
    data
}

/// Register write request
pub fn register_write(register: u16, value: u32) -> [u8; 12] {
    let mut data = register_read(register);
    data[8..12].copy_from_slice(&value.to_le_bytes());
    data
}

/// Axis group with a hardware end stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndStop {
    /// X limit switch
    X,
    /// Y limit switch
    Y,
    /// Z limit switch
    Z,
}

impl EndStop {
    /// All end stops, in the order the stock software toggles them
    pub const ALL: [EndStop; 3] = [EndStop::X, EndStop::Y, EndStop::Z];

    /// Register controlling this end stop
    pub fn register(self) -> u16 {
        match self {
            EndStop::X => REG_ENDSTOP_X,
            EndStop::Y => REG_ENDSTOP_Y,
            EndStop::Z => REG_ENDSTOP_Z,
        }
    }
}

/// Enable or release one end stop
pub fn end_stop(stop: EndStop, enable: bool) -> [u8; 12] {
    let value = if enable { 0 } else { ENDSTOP_DISABLED };
    register_write(stop.register(), value)
}

/// Unlock the front panel, sent ahead of every XY move
pub fn unlock_front_panel() -> [u8; 12] {
    register_write(REG_FRONT_PANEL, 1)
}

/// Register query issued during initialisation
pub fn register_query(register: u16) -> [u8; 12] {
    let mut data = register_read(register);
    data[0] = OP_REGISTER_QUERY;
    data
}

/// Value carried in a register reply, if the reply is long enough
pub fn parse_register_reply(reply: &[u8]) -> Option<u32> {
    let field = reply.get(8..12)?;
    Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}
