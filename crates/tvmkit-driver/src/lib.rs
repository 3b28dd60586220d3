//! # TVMKit Driver
//!
//! The pick-and-place facing side of TVMKit: resolves tool names to heads,
//! applies tool offsets, remembers commanded locations, and runs the slot
//! feeders on top of the TVM920 motion controller.

pub mod driver;
pub mod feeders;
pub mod location_cache;
pub mod tools;

pub use driver::{Tvm920Driver, DOWN_CAM_LIGHTS, UP_CAM_LIGHTS};
pub use feeders::{slot_index, FeederBank, FeederSlots, REAR_BASE};
pub use location_cache::LocationCache;
pub use tools::{Tool, ToolMap, NOZZLE_PREFIX};
