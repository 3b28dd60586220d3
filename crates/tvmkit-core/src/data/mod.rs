//! Data models for locations, axes, and machine calibration
//!
//! This module provides:
//! - Locations in physical space with a length unit
//! - Axis and head identifiers for the four-head gantry
//! - Calibration constants and travel limits

pub mod machine;

pub use machine::{Axis, CalibrationConstants, HeadIndex, HeadPair, MachineLimits, HEAD_COUNT};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length unit of a [`Location`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Millimeters (the driver's native unit)
    #[default]
    Millimeters,
    /// Inches
    Inches,
}

impl LengthUnit {
    /// Convert a value from one unit to another
    pub fn convert(value: f64, from: LengthUnit, to: LengthUnit) -> f64 {
        match (from, to) {
            (LengthUnit::Millimeters, LengthUnit::Inches) => value / 25.4,
            (LengthUnit::Inches, LengthUnit::Millimeters) => value * 25.4,
            _ => value,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthUnit::Millimeters => write!(f, "mm"),
            LengthUnit::Inches => write!(f, "in"),
        }
    }
}

/// A point in machine space plus a rotation.
///
/// Any coordinate may be NaN, meaning "unspecified": a move leaves that axis
/// where it is. Rotation is in degrees and is never unit-converted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Z position
    pub z: f64,
    /// Rotation in degrees
    pub rotation: f64,
    /// Unit of x, y, z
    #[serde(default)]
    pub units: LengthUnit,
}

impl Location {
    /// Create a location in millimeters
    pub fn new(x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self::with_units(LengthUnit::Millimeters, x, y, z, rotation)
    }

    /// Create a location in the given unit
    pub fn with_units(units: LengthUnit, x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self {
            x,
            y,
            z,
            rotation,
            units,
        }
    }

    /// A location with every coordinate unspecified
    pub fn unspecified() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    /// Copy of this location with the given coordinates replaced
    pub fn derive(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        rotation: Option<f64>,
    ) -> Self {
        Self {
            x: x.unwrap_or(self.x),
            y: y.unwrap_or(self.y),
            z: z.unwrap_or(self.z),
            rotation: rotation.unwrap_or(self.rotation),
            units: self.units,
        }
    }

    /// Convert to another length unit
    pub fn convert_to_units(&self, units: LengthUnit) -> Self {
        Self {
            x: LengthUnit::convert(self.x, self.units, units),
            y: LengthUnit::convert(self.y, self.units, units),
            z: LengthUnit::convert(self.z, self.units, units),
            rotation: self.rotation,
            units,
        }
    }

    /// Component-wise sum, `other` converted into this location's unit
    pub fn add(&self, other: &Location) -> Self {
        let other = other.convert_to_units(self.units);
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            rotation: self.rotation + other.rotation,
            units: self.units,
        }
    }

    /// Component-wise difference, `other` converted into this location's unit
    pub fn subtract(&self, other: &Location) -> Self {
        let other = other.convert_to_units(self.units);
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            rotation: self.rotation - other.rotation,
            units: self.units,
        }
    }

    /// X as an option, `None` when unspecified
    pub fn x_opt(&self) -> Option<f64> {
        specified(self.x)
    }

    /// Y as an option, `None` when unspecified
    pub fn y_opt(&self) -> Option<f64> {
        specified(self.y)
    }

    /// Z as an option, `None` when unspecified
    pub fn z_opt(&self) -> Option<f64> {
        specified(self.z)
    }

    /// Rotation as an option, `None` when unspecified
    pub fn rotation_opt(&self) -> Option<f64> {
        specified(self.rotation)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.3} Y:{:.3} Z:{:.3} R:{:.3} ({})",
            self.x, self.y, self.z, self.rotation, self.units
        )
    }
}

fn specified(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        assert_eq!(
            LengthUnit::convert(25.4, LengthUnit::Millimeters, LengthUnit::Inches),
            1.0
        );
        assert_eq!(
            LengthUnit::convert(2.0, LengthUnit::Inches, LengthUnit::Millimeters),
            50.8
        );
        assert_eq!(
            LengthUnit::convert(3.0, LengthUnit::Inches, LengthUnit::Inches),
            3.0
        );
    }

    #[test]
    fn test_subtract_converts_units() {
        let target = Location::new(100.0, 50.0, -5.0, 90.0);
        let offset = Location::with_units(LengthUnit::Inches, 1.0, 0.0, 0.0, 0.0);
        let result = target.subtract(&offset);
        assert!((result.x - 74.6).abs() < 1e-9);
        assert_eq!(result.y, 50.0);
        assert_eq!(result.rotation, 90.0);
        assert_eq!(result.units, LengthUnit::Millimeters);
    }

    #[test]
    fn test_unspecified_coordinates() {
        let loc = Location::new(1.0, f64::NAN, 2.0, f64::NAN);
        assert_eq!(loc.x_opt(), Some(1.0));
        assert_eq!(loc.y_opt(), None);
        assert_eq!(loc.rotation_opt(), None);

        let derived = loc.derive(None, Some(4.0), None, None);
        assert_eq!(derived.y_opt(), Some(4.0));
        assert_eq!(derived.x, 1.0);
    }

    #[test]
    fn test_location_serde() {
        let loc = Location::new(324.0, 112.0, 0.0, 0.0);
        let json = serde_json::to_string(&loc).unwrap();
        let back: Location = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);
    }
}
