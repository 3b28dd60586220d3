//! # TVMKit Core
//!
//! Core types, traits, and utilities for TVMKit.
//! Provides the error taxonomy, machine data model (locations, axes,
//! calibration), cancellation, and the narrow collaborator interfaces the
//! motion core consumes from the host application.

pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use core::{
    cancel::CancellationToken,
    collaborators::{FiducialLocator, Part, PartLookup, StaticPartLookup},
};

pub use data::{
    Axis, CalibrationConstants, HeadIndex, HeadPair, LengthUnit, Location, MachineLimits,
    HEAD_COUNT,
};

pub use error::{ConnectionError, ControllerError, Error, ProtocolError, Result};

pub use types::{thread_safe, thread_safe_rw, ThreadSafe, ThreadSafeRw};
