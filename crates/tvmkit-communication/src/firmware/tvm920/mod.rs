//! TVM920 controller protocol and motion control
//!
//! Layering, leaf first:
//! - [`status_parser`]: status datagram decoding and the shared status cache
//! - [`command_creator`]: request datagram builders
//! - [`speed`]: speed band tables
//! - [`axis_model`]: unit conversion including the Z arm model
//! - [`axis_state`]: per-axis position cache
//! - [`controller`]: moves, actuation, and initialisation
//! - [`homing`]: the homing cycle
//! - [`heartbeat`]: background status polling

pub mod axis_model;
pub mod axis_state;
pub mod command_creator;
pub mod controller;
pub mod heartbeat;
pub mod homing;
pub mod speed;
pub mod status_parser;

pub use axis_model::{normalize_theta, AxisModel};
pub use axis_state::{AxisState, AxisStates};
pub use command_creator::{AxisCommand, EndStop};
pub use controller::{MotionController, MotionState, MotionTiming};
pub use heartbeat::HeartbeatScheduler;
pub use homing::HomingConfig;
pub use speed::SpeedBand;
pub use status_parser::{SharedStatusCache, StatusMessage, StatusSnapshot, TickChannel};
