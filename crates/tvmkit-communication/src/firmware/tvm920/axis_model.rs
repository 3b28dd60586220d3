//! Unit conversion between physical coordinates and controller ticks
//!
//! X, Y and theta are linear. Z is not: each head pair is lifted by a rotary
//! actuator through an arm of length `L`, so lift distance follows the sine
//! of the arm angle. Heads on the same drive move in opposite directions,
//! which is why odd heads see the negated tick value.

use std::f64::consts::PI;
use tvmkit_core::{CalibrationConstants, HeadIndex};

/// Largest magnitude a 24-bit signed tick field can hold
pub const MAX_TICKS: i32 = 0x7F_FFFF;

/// Converts between millimeters/degrees and ticks using one machine's
/// calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisModel {
    calibration: CalibrationConstants,
}

impl AxisModel {
    /// Create a model for the given calibration
    pub fn new(calibration: CalibrationConstants) -> Self {
        Self { calibration }
    }

    /// Calibration in use
    pub fn calibration(&self) -> &CalibrationConstants {
        &self.calibration
    }

    /// X millimeters to ticks
    pub fn x_mm_to_ticks(&self, mm: f64) -> i32 {
        to_ticks(mm * self.calibration.ticks_per_mm_x)
    }

    /// X ticks to millimeters
    pub fn x_ticks_to_mm(&self, ticks: i32) -> f64 {
        f64::from(ticks) / self.calibration.ticks_per_mm_x
    }

    /// Y millimeters to ticks
    pub fn y_mm_to_ticks(&self, mm: f64) -> i32 {
        to_ticks(mm * self.calibration.ticks_per_mm_y)
    }

    /// Y ticks to millimeters
    pub fn y_ticks_to_mm(&self, ticks: i32) -> f64 {
        f64::from(ticks) / self.calibration.ticks_per_mm_y
    }

    /// Theta degrees to ticks
    pub fn theta_deg_to_ticks(&self, degrees: f64) -> i32 {
        to_ticks(degrees * self.calibration.ticks_per_degree)
    }

    /// Theta ticks to degrees
    pub fn theta_ticks_to_deg(&self, ticks: i32) -> f64 {
        f64::from(ticks) / self.calibration.ticks_per_degree
    }

    /// Z lift distance (negative is down from home) to drive ticks.
    ///
    /// For `distance` in `[-L, 0]` the arm angle is `asin(distance / L)`.
    /// Below `-L` the arm has swung past horizontal and the supplementary
    /// angle is used, negated. Distances outside `[-2L, L]` saturate.
    pub fn z_distance_to_ticks(&self, distance: f64) -> i32 {
        let arm = self.calibration.z_arm_length;
        let distance = distance.clamp(-2.0 * arm, arm);
        let radians = if distance < -arm {
            -(PI - unit_asin((2.0 * arm + distance) / arm))
        } else {
            unit_asin(distance / arm)
        };
        to_ticks(radians.to_degrees() * self.calibration.ticks_per_degree)
    }

    /// Z drive ticks to lift distance. Inverse of
    /// [`AxisModel::z_distance_to_ticks`].
    pub fn z_ticks_to_distance(&self, ticks: i32) -> f64 {
        let arm = self.calibration.z_arm_length;
        let degrees = f64::from(ticks) / self.calibration.ticks_per_degree;
        let radians = degrees.to_radians();
        if degrees <= -90.0 {
            -(2.0 * arm - arm * (PI + radians).sin())
        } else {
            arm * radians.sin()
        }
    }

    /// Z of one head to the ticks sent to its shared drive
    pub fn z_mm_to_head_ticks(&self, head: HeadIndex, z: f64) -> i32 {
        let ticks = self.z_distance_to_ticks(z);
        if head.is_mirrored() {
            -ticks
        } else {
            ticks
        }
    }

    /// Ticks reported by a head's shared drive to that head's Z
    pub fn z_head_ticks_to_mm(&self, head: HeadIndex, ticks: i32) -> f64 {
        let ticks = if head.is_mirrored() { -ticks } else { ticks };
        self.z_ticks_to_distance(ticks)
    }
}

/// Wrap an angle into `[-180, 180)`
pub fn normalize_theta(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

fn unit_asin(value: f64) -> f64 {
    value.clamp(-1.0, 1.0).asin()
}

fn to_ticks(value: f64) -> i32 {
    value.round().clamp(-f64::from(MAX_TICKS), f64::from(MAX_TICKS)) as i32
}
