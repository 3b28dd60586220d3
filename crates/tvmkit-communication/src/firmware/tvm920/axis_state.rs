//! Per-axis position cache
//!
//! Position reads are on the hot path of every pick, and each status
//! round trip costs several milliseconds. An axis whose last move finished
//! and whose position was read back from a confirmed-stopped status is
//! answered from here without touching the network.

use std::collections::HashMap;
use tvmkit_core::{Axis, HeadPair};

/// Cached knowledge about one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisState {
    /// Last known position in millimeters or degrees
    pub position: f64,
    /// The cached position may not match the machine
    pub stale: bool,
    /// A move covering this axis is in flight
    pub moving: bool,
}

impl Default for AxisState {
    fn default() -> Self {
        Self {
            position: 0.0,
            stale: true,
            moving: false,
        }
    }
}

impl AxisState {
    /// Whether a read must go to the controller
    pub fn needs_refresh(&self) -> bool {
        self.stale || self.moving
    }
}

/// Cache for every axis of the machine, filled lazily
#[derive(Debug, Default)]
pub struct AxisStates {
    axes: HashMap<Axis, AxisState>,
    z_home: HashMap<HeadPair, bool>,
}

impl AxisStates {
    /// Create an empty cache; every axis starts stale
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one axis
    pub fn get(&self, axis: Axis) -> AxisState {
        self.axes.get(&axis).copied().unwrap_or_default()
    }

    fn entry(&mut self, axis: Axis) -> &mut AxisState {
        self.axes.entry(axis).or_default()
    }

    /// Mark axes as commanded: stale and moving
    pub fn begin_move(&mut self, axes: &[Axis]) {
        for &axis in axes {
            let state = self.entry(axis);
            state.stale = true;
            state.moving = true;
        }
    }

    /// Clear the moving flag of axes whose move ended
    pub fn end_move(&mut self, axes: &[Axis]) {
        for &axis in axes {
            self.entry(axis).moving = false;
        }
    }

    /// Record a position read back from the controller. It becomes
    /// authoritative only if `confirmed` and the axis is not moving.
    pub fn record(&mut self, axis: Axis, position: f64, confirmed: bool) {
        let state = self.entry(axis);
        state.position = position;
        state.stale = !confirmed || state.moving;
    }

    /// Mark an axis stale without other changes
    pub fn invalidate(&mut self, axis: Axis) {
        self.entry(axis).stale = true;
    }

    /// Whether a head pair's drive was last sent to zero
    pub fn is_z_home(&self, pair: HeadPair) -> bool {
        self.z_home.get(&pair).copied().unwrap_or(false)
    }

    /// Remember whether a head pair's drive sits at zero
    pub fn set_z_home(&mut self, pair: HeadPair, home: bool) {
        self.z_home.insert(pair, home);
    }
}
