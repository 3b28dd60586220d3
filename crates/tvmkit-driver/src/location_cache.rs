//! Last commanded location of the gantry and of each nozzle's Z
//!
//! The host asks for tool locations far more often than it moves them, so
//! the facade answers from what it last commanded. Only the gantry XY and
//! rotation are tracked per head reference point; Z is tracked per physical
//! head because the nozzles lift independently.

use tvmkit_core::{HeadIndex, LengthUnit, Location, HEAD_COUNT};

/// Commanded positions in millimeters
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCache {
    gantry: Location,
    nozzle_z: [f64; HEAD_COUNT],
}

impl Default for LocationCache {
    fn default() -> Self {
        Self {
            gantry: Location::new(0.0, 0.0, 0.0, 0.0),
            nozzle_z: [0.0; HEAD_COUNT],
        }
    }
}

impl LocationCache {
    /// Cache with everything at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Gantry reference point location
    pub fn gantry(&self) -> Location {
        self.gantry
    }

    /// Last commanded Z of one head
    pub fn nozzle_z(&self, head: HeadIndex) -> f64 {
        self.nozzle_z[head.get()]
    }

    /// Record a completed move. NaN coordinates leave the cached value.
    ///
    /// Only a head rotates, so a fixed tool's rotation is not recorded.
    pub fn record_move(&mut self, head: Option<HeadIndex>, target: &Location) {
        let target = target.convert_to_units(LengthUnit::Millimeters);
        let rotation = head.and(target.rotation_opt());
        self.gantry = self
            .gantry
            .derive(target.x_opt(), target.y_opt(), None, rotation);
        if let (Some(head), Some(z)) = (head, target.z_opt()) {
            self.nozzle_z[head.get()] = z;
        }
    }

    /// Reset after homing: gantry at `(x, y)`, every Z at home
    pub fn homed_at(&mut self, x: f64, y: f64) {
        self.gantry = Location::new(x, y, 0.0, 0.0);
        self.nozzle_z = [0.0; HEAD_COUNT];
    }
}
