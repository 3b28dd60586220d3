//! Common type aliases used across TVMKit crates.

mod aliases;

pub use aliases::*;
