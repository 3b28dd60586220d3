//! Controller firmware implementations
//!
//! Supported controllers:
//! - TVM920: four-head pick-and-place controller on a binary UDP protocol

pub mod tvm920;
