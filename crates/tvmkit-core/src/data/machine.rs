//! Machine geometry: heads, axes, calibration, and travel limits

use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of independent pick/place heads on the gantry
pub const HEAD_COUNT: usize = 4;

/// Index of one of the four heads, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeadIndex(u8);

/// The two heads sharing one rotary Z drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadPair {
    /// Heads 0 and 1
    Z01,
    /// Heads 2 and 3
    Z23,
}

impl HeadIndex {
    /// Validate a raw head number
    pub fn new(index: usize) -> Result<Self, ControllerError> {
        if index < HEAD_COUNT {
            Ok(Self(index as u8))
        } else {
            Err(ControllerError::invalid_argument(format!(
                "head index {} out of range 0..={}",
                index,
                HEAD_COUNT - 1
            )))
        }
    }

    /// All heads in order
    pub fn all() -> impl Iterator<Item = HeadIndex> {
        (0..HEAD_COUNT as u8).map(HeadIndex)
    }

    /// Raw index
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Which shared Z drive this head sits on
    pub fn pair(self) -> HeadPair {
        if self.0 < 2 {
            HeadPair::Z01
        } else {
            HeadPair::Z23
        }
    }

    /// Odd heads are driven with the inverted sign of their pair partner
    pub fn is_mirrored(self) -> bool {
        self.0 % 2 == 1
    }
}

impl fmt::Display for HeadIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl HeadPair {
    /// Both heads on this drive
    pub fn heads(self) -> [HeadIndex; 2] {
        match self {
            HeadPair::Z01 => [HeadIndex(0), HeadIndex(1)],
            HeadPair::Z23 => [HeadIndex(2), HeadIndex(3)],
        }
    }
}

/// A logical axis whose position is tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Gantry X
    X,
    /// Gantry Y
    Y,
    /// Lift of one head
    Z(HeadIndex),
    /// Rotation of one head
    Theta(HeadIndex),
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z(head) => write!(f, "Z{}", head),
            Axis::Theta(head) => write!(f, "Theta{}", head),
        }
    }
}

/// Per-machine calibration. Fixed for the lifetime of a driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConstants {
    /// Ticks per millimeter on X
    pub ticks_per_mm_x: f64,
    /// Ticks per millimeter on Y
    pub ticks_per_mm_y: f64,
    /// Linear-equivalent ticks per millimeter on Z, informational only
    pub ticks_per_mm_z: f64,
    /// Ticks per degree for theta and for the Z rotary drive
    pub ticks_per_degree: f64,
    /// Radius of the Z lift arm in millimeters
    pub z_arm_length: f64,
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        Self {
            ticks_per_mm_x: 327.55,
            ticks_per_mm_y: 204.85,
            ticks_per_mm_z: 262.37,
            // 6400 ticks per revolution
            ticks_per_degree: 17.77,
            z_arm_length: 10.0,
        }
    }
}

/// Travel bounds, enforced once the machine has homed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLimits {
    /// Maximum X in millimeters (minimum is 0)
    pub max_x: f64,
    /// Maximum Y in millimeters (minimum is 0)
    pub max_y: f64,
    /// Lowest Z in millimeters (maximum is 0)
    pub min_z: f64,
    /// Speed fraction used for every move before homing completes
    pub homing_speed: f64,
}

impl Default for MachineLimits {
    fn default() -> Self {
        Self {
            max_x: 470.0,
            max_y: 510.0,
            min_z: -17.0,
            homing_speed: 0.4,
        }
    }
}
