//! # TVMKit Communication
//!
//! Transport and firmware implementation for the TVM920 pick-and-place
//! controller. The controller speaks fixed-layout binary datagrams over
//! UDP; a simulated transport with the same behaviour backs the tests and
//! the dry-run mode.

pub mod communication;
pub mod firmware;

pub use communication::{
    HardwareTransport, Link, LinkTiming, SimulatedConfig, SimulatedHandle, SimulatedTransport,
    Transport,
};

pub use firmware::tvm920::{
    AxisCommand, AxisModel, EndStop, HeartbeatScheduler, HomingConfig, MotionController,
    MotionState, MotionTiming, SpeedBand, StatusMessage, TickChannel,
};
