//! In-process emulation of a TVM920 controller
//!
//! Answers the same datagrams the hardware does, well enough to run homing,
//! moves, and actuation without a machine attached. Moves complete after a
//! fixed number of status polls rather than in real time.

use super::Transport;
use crate::firmware::tvm920::command_creator::{
    parse_register_reply, AxisCommand, EndStop, FEEDER_LEN, OP_FEEDER, OP_GPIO_CLEAR,
    OP_GPIO_SET, OP_MOTION_ENABLE, OP_MOVE, OP_REGISTER, OP_REGISTER_QUERY, OP_SET_POSITION,
    OP_SPEED_TABLE, OP_STATUS,
};
use crate::firmware::tvm920::status_parser::{StatusBuilder, TickChannel};
use std::collections::HashMap;
use std::time::Duration;
use tvmkit_core::{thread_safe, ConnectionError, HeadPair, ThreadSafe};

/// Behaviour knobs of the emulated controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedConfig {
    /// Status polls a moved axis reports busy before it stops
    pub settle_polls: u32,
    /// X position of the X end stop in ticks
    pub x_end_stop_ticks: i32,
    /// Y position of the Y end stop in ticks
    pub y_end_stop_ticks: i32,
    /// Z drive ticks either side of zero where the home switch is made
    pub z_home_window_ticks: i32,
    /// Length of the status reply
    pub status_len: usize,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            settle_polls: 2,
            // 470 mm and 510 mm at the stock calibration
            x_end_stop_ticks: 153_949,
            y_end_stop_ticks: 104_474,
            z_home_window_ticks: 8,
            status_len: 128,
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    ticks: HashMap<TickChannel, i32>,
    busy: HashMap<TickChannel, u32>,
    registers: HashMap<u16, u32>,
    gpio: u32,
    feeders: [u8; FEEDER_LEN],
    motion_enabled: bool,
    speed_class: Option<u8>,
    moves: u32,
    drop_replies: u32,
    pending: Option<Vec<u8>>,
}

/// Transport backed by the emulated controller
#[derive(Debug)]
pub struct SimulatedTransport {
    config: SimulatedConfig,
    state: ThreadSafe<ControllerState>,
}

/// Inspection and fault-injection handle onto a [`SimulatedTransport`]
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: ThreadSafe<ControllerState>,
}

impl SimulatedTransport {
    /// Create an emulated controller with every axis at zero
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            state: thread_safe(ControllerState::default()),
        }
    }

    /// Handle for observing the emulated machine from outside the link
    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: self.state.clone(),
        }
    }

    fn status_reply(&self, state: &mut ControllerState) -> Vec<u8> {
        let mut builder = StatusBuilder::new(self.config.status_len);
        for (&channel, &ticks) in &state.ticks {
            builder = builder.ticks(channel, ticks);
        }
        for (&channel, remaining) in state.busy.iter_mut() {
            if *remaining > 0 {
                builder = builder.busy(channel, true);
                *remaining -= 1;
            }
        }
        state.busy.retain(|_, remaining| *remaining > 0);

        for pair in [HeadPair::Z01, HeadPair::Z23] {
            let ticks = state.ticks.get(&TickChannel::Z(pair)).copied().unwrap_or(0);
            builder = builder.z_home(pair, ticks.abs() <= self.config.z_home_window_ticks);
        }
        builder.build()
    }

    fn end_stop_limit(&self, state: &ControllerState, channel: TickChannel) -> Option<i32> {
        let (stop, limit) = match channel {
            TickChannel::X => (EndStop::X, self.config.x_end_stop_ticks),
            TickChannel::Y => (EndStop::Y, self.config.y_end_stop_ticks),
            _ => return None,
        };
        let enabled = state.registers.get(&stop.register()).copied().unwrap_or(0) == 0;
        enabled.then_some(limit)
    }

    fn apply_axis_command(&self, state: &mut ControllerState, command: &AxisCommand) {
        if command.opcode() == OP_SET_POSITION {
            for (channel, ticks) in command.targets() {
                state.ticks.insert(channel, ticks);
            }
            return;
        }

        if !state.motion_enabled {
            tracing::debug!("Simulated TVM920 ignoring move while motion is disabled");
            return;
        }

        state.moves += 1;
        for (channel, target) in command.targets() {
            let target = match self.end_stop_limit(state, channel) {
                Some(limit) if target > limit => limit,
                _ => target,
            };
            state.ticks.insert(channel, target);
            if self.config.settle_polls > 0 {
                state.busy.insert(channel, self.config.settle_polls);
            }
        }
    }

    fn register_reply(state: &mut ControllerState, request: &[u8]) -> Vec<u8> {
        let mut reply = [0u8; 12];
        let len = request.len().min(reply.len());
        reply[..len].copy_from_slice(&request[..len]);

        let register = u16::from_le_bytes([reply[4], reply[5]]);
        let value = parse_register_reply(&reply).unwrap_or(0);
        let is_end_stop = EndStop::ALL.iter().any(|s| s.register() == register);

        // Reads and zero writes share a layout; end stops are the only
        // registers the driver ever writes zero to.
        if reply[0] == OP_REGISTER && (value != 0 || is_end_stop) {
            state.registers.insert(register, value);
        }

        let current = state.registers.get(&register).copied().unwrap_or(0);
        reply[8..12].copy_from_slice(&current.to_le_bytes());
        reply.to_vec()
    }

    fn handle_request(&self, request: &[u8]) -> Option<Vec<u8>> {
        let opcode = *request.first()?;
        let mut state = self.state.lock();

        let reply = match opcode {
            OP_STATUS => self.status_reply(&mut state),
            OP_MOVE | OP_SET_POSITION => {
                if let Some(command) = AxisCommand::decode(request) {
                    self.apply_axis_command(&mut state, &command);
                }
                request.to_vec()
            }
            OP_MOTION_ENABLE => {
                state.motion_enabled = request.get(2).copied().unwrap_or(0) != 0;
                request.to_vec()
            }
            OP_SPEED_TABLE => {
                state.speed_class = request.get(2).copied();
                request.to_vec()
            }
            OP_FEEDER => {
                let len = request.len().min(FEEDER_LEN);
                state.feeders = [0; FEEDER_LEN];
                state.feeders[..len].copy_from_slice(&request[..len]);
                request.to_vec()
            }
            OP_GPIO_SET | OP_GPIO_CLEAR => {
                if let Some(mask) = request.get(4..8) {
                    let mask = u32::from_le_bytes([mask[0], mask[1], mask[2], mask[3]]);
                    if opcode == OP_GPIO_SET {
                        state.gpio |= mask;
                    } else {
                        state.gpio &= !mask;
                    }
                }
                request.to_vec()
            }
            OP_REGISTER | OP_REGISTER_QUERY => Self::register_reply(&mut state, request),
            _ => request.to_vec(),
        };

        if state.drop_replies > 0 {
            state.drop_replies -= 1;
            return None;
        }
        Some(reply)
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl Transport for SimulatedTransport {
    fn send(&mut self, datagram: &[u8]) -> Result<(), ConnectionError> {
        let reply = self.handle_request(datagram);
        self.state.lock().pending = reply;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, ConnectionError> {
        self.state
            .lock()
            .pending
            .take()
            .ok_or(ConnectionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

impl SimulatedHandle {
    /// Current tick count of a channel
    pub fn ticks(&self, channel: TickChannel) -> i32 {
        self.state.lock().ticks.get(&channel).copied().unwrap_or(0)
    }

    /// Place a channel at a tick count without a move
    pub fn set_ticks(&self, channel: TickChannel, ticks: i32) {
        self.state.lock().ticks.insert(channel, ticks);
    }

    /// GPIO output word
    pub fn gpio(&self) -> u32 {
        self.state.lock().gpio
    }

    /// Last feeder datagram
    pub fn feeders(&self) -> [u8; FEEDER_LEN] {
        self.state.lock().feeders
    }

    /// Register value
    pub fn register(&self, register: u16) -> u32 {
        self.state.lock().registers.get(&register).copied().unwrap_or(0)
    }

    /// Whether the motion lockout is released
    pub fn motion_enabled(&self) -> bool {
        self.state.lock().motion_enabled
    }

    /// Speed class byte of the last speed table, if any was loaded
    pub fn speed_class(&self) -> Option<u8> {
        self.state.lock().speed_class
    }

    /// Number of move datagrams executed
    pub fn move_count(&self) -> u32 {
        self.state.lock().moves
    }

    /// Swallow the replies to the next `count` requests
    pub fn drop_replies(&self, count: u32) {
        self.state.lock().drop_replies = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::tvm920::command_creator::{
        end_stop, gpio, motion_enable, register_read, register_write, status_request,
    };
    use crate::firmware::tvm920::status_parser::StatusMessage;

    fn exchange(transport: &mut SimulatedTransport, datagram: &[u8]) -> Option<Vec<u8>> {
        transport.send(datagram).unwrap();
        transport.receive(Duration::from_millis(1)).ok()
    }

    fn status(transport: &mut SimulatedTransport) -> StatusMessage {
        StatusMessage::decode(&exchange(transport, &status_request()).unwrap()).unwrap()
    }

    #[test]
    fn test_move_requires_motion_enable() {
        let mut sim = SimulatedTransport::default();
        let handle = sim.handle();

        exchange(&mut sim, AxisCommand::movement().x(500).as_bytes());
        assert_eq!(handle.ticks(TickChannel::X), 0);

        exchange(&mut sim, &motion_enable(true));
        exchange(&mut sim, AxisCommand::movement().x(500).as_bytes());
        assert_eq!(handle.ticks(TickChannel::X), 500);
        assert_eq!(handle.move_count(), 1);
    }

    #[test]
    fn test_busy_clears_after_settle_polls() {
        let mut sim = SimulatedTransport::default();
        exchange(&mut sim, &motion_enable(true));
        exchange(&mut sim, AxisCommand::movement().y(100).as_bytes());

        assert!(!status(&mut sim).is_xy_stopped());
        assert!(!status(&mut sim).is_xy_stopped());
        let settled = status(&mut sim);
        assert!(settled.is_xy_stopped());
        assert_eq!(settled.ticks(TickChannel::Y), 100);
    }

    #[test]
    fn test_end_stop_clamps_until_released() {
        let mut sim = SimulatedTransport::default();
        let handle = sim.handle();
        exchange(&mut sim, &motion_enable(true));

        exchange(&mut sim, AxisCommand::movement().x(400_000).as_bytes());
        assert_eq!(handle.ticks(TickChannel::X), 153_949);

        exchange(&mut sim, &end_stop(EndStop::X, false));
        assert_eq!(handle.register(EndStop::X.register()), 0x0100_0000);
        exchange(&mut sim, AxisCommand::movement().x(400_000).as_bytes());
        assert_eq!(handle.ticks(TickChannel::X), 400_000);

        exchange(&mut sim, &end_stop(EndStop::X, true));
        assert_eq!(handle.register(EndStop::X.register()), 0);
    }

    #[test]
    fn test_z_home_switch_window() {
        let mut sim = SimulatedTransport::default();
        let handle = sim.handle();
        assert!(status(&mut sim).is_z01_home());

        handle.set_ticks(TickChannel::Z(HeadPair::Z01), -100);
        let s = status(&mut sim);
        assert!(!s.is_z01_home());
        assert!(s.is_z23_home());
    }

    #[test]
    fn test_registers_and_gpio() {
        let mut sim = SimulatedTransport::default();
        let handle = sim.handle();

        exchange(&mut sim, &register_write(0x10F4, 1));
        let reply = exchange(&mut sim, &register_read(0x10F4)).unwrap();
        assert_eq!(parse_register_reply(&reply), Some(1));

        exchange(&mut sim, &gpio(true, 0x101));
        exchange(&mut sim, &gpio(false, 0x001));
        assert_eq!(handle.gpio(), 0x100);
    }

    #[test]
    fn test_dropped_replies() {
        let mut sim = SimulatedTransport::default();
        sim.handle().drop_replies(1);
        assert!(exchange(&mut sim, &status_request()).is_none());
        assert!(exchange(&mut sim, &status_request()).is_some());
    }
}
