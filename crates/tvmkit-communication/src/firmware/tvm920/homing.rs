//! Homing cycle
//!
//! Z has home switches reported in the status message, so each drive is
//! walked off its switch and back on in small steps. X and Y have no status
//! flags; they are driven onto their end stops, the stop is released, and
//! the axis backs off a fixed distance. A vision fiducial then corrects the
//! absolute XY origin.

use super::command_creator::EndStop;
use super::controller::{pause, MotionController};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tvmkit_core::{
    ControllerError, FiducialLocator, HeadIndex, HeadPair, LengthUnit, Location, PartLookup,
    Result,
};

/// Part the host must define for fiducial correction to run
pub const FIDUCIAL_PART_ID: &str = "FIDUCIAL-HOME";

/// Distance moved off an X/Y end stop after hitting it
const BACK_OFF_MM: f64 = 5.0;
/// Relative travel that is guaranteed to reach an end stop
const SEEK_TRAVEL_MM: f64 = 1000.0;
const Z_WALK_OFF_MM: f64 = -1.0;
const Z_WALK_ON_MM: f64 = 0.1;
/// Speed for the move onto the fiducial
const FIDUCIAL_SPEED: f64 = 0.5;

/// Parameters of the homing cycle
#[derive(Debug, Clone, PartialEq)]
pub struct HomingConfig {
    /// Where the homing fiducial should be after mechanical homing
    pub fiducial: Option<Location>,
    /// Part id looked up to decide whether vision correction runs
    pub fiducial_part_id: String,
    /// Most steps one Z walk may take before homing fails
    pub walk_max_steps: u32,
    /// Pause after each Z walk step
    pub walk_settle: Duration,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            fiducial: Some(Location::new(324.0, 112.0, 0.0, 0.0)),
            fiducial_part_id: FIDUCIAL_PART_ID.to_string(),
            walk_max_steps: 400,
            walk_settle: Duration::from_millis(50),
        }
    }
}

impl MotionController {
    /// Run the full homing cycle: Z, then Y, then X, then fiducial
    /// correction. The machine counts as homed only if every step succeeds.
    pub fn find_home(
        &self,
        locator: Option<&dyn FiducialLocator>,
        parts: &dyn PartLookup,
    ) -> Result<()> {
        tracing::info!("TVM920: homing");
        self.homed.store(false, Ordering::SeqCst);
        let homing = self.homing.read().clone();

        let [z01_head, _] = HeadPair::Z01.heads();
        let [_, z23_head] = HeadPair::Z23.heads();
        self.home_z(z01_head, &homing)?;
        self.home_z(z23_head, &homing)?;
        self.zero_all_z();

        self.home_gantry_axis(EndStop::Y)?;
        self.home_gantry_axis(EndStop::X)?;
        let limits = *self.limits();
        self.set_xy_position_mm(limits.max_x - BACK_OFF_MM, limits.max_y - BACK_OFF_MM);

        self.correct_with_fiducial(&homing, locator, parts)?;

        self.homed.store(true, Ordering::SeqCst);
        tracing::info!("TVM920: homing complete");
        Ok(())
    }

    fn home_z(&self, head: HeadIndex, homing: &HomingConfig) -> Result<()> {
        tracing::debug!("TVM920: homing Z via head {}", head);
        self.walk_z(head, Z_WALK_OFF_MM, false, homing)?;
        self.walk_z(head, Z_WALK_ON_MM, true, homing)
    }

    /// Step `head` by `step_mm` until its drive's home switch reads `until`
    fn walk_z(
        &self,
        head: HeadIndex,
        step_mm: f64,
        until: bool,
        homing: &HomingConfig,
    ) -> Result<()> {
        let pair = head.pair();
        let speed = self.limits().homing_speed;

        for _ in 0..homing.walk_max_steps {
            if self.cancellation_token().is_cancelled() {
                return Err(ControllerError::Cancelled.into());
            }
            self.link().request_status();
            if self.link().status().message().is_z_home(pair) == until {
                return Ok(());
            }
            self.move_z_relative(head, step_mm, speed)?;
            pause(homing.walk_settle);
        }

        let wanted = if until { "assert" } else { "clear" };
        Err(ControllerError::HomingFailed {
            reason: format!(
                "{:?} home switch did not {} within {} steps",
                pair, wanted, homing.walk_max_steps
            ),
        }
        .into())
    }

    fn home_gantry_axis(&self, stop: EndStop) -> Result<()> {
        tracing::debug!("TVM920: homing {:?}", stop);
        let speed = self.limits().homing_speed;
        let relative = |mm: f64| match stop {
            EndStop::X => self.move_xy_theta_relative(Some(mm), None, None, None, speed),
            _ => self.move_xy_theta_relative(None, Some(mm), None, None, speed),
        };

        self.set_all_end_stops(true);
        relative(SEEK_TRAVEL_MM)?;
        self.set_end_stop(stop, false);
        relative(-BACK_OFF_MM)?;
        self.set_all_end_stops(true);
        Ok(())
    }

    fn correct_with_fiducial(
        &self,
        homing: &HomingConfig,
        locator: Option<&dyn FiducialLocator>,
        parts: &dyn PartLookup,
    ) -> Result<()> {
        let limits = *self.limits();
        let expected = homing
            .fiducial
            .map(|f| f.convert_to_units(LengthUnit::Millimeters))
            .filter(|f| f.x > 0.0 && f.y > 0.0 && f.x < limits.max_x && f.y < limits.max_y);

        let Some(expected) = expected else {
            tracing::warn!("TVM920: homing fiducial is outside the table, skipping correction");
            return Ok(());
        };

        self.move_xy_theta_absolute(Some(expected.x), Some(expected.y), None, None, FIDUCIAL_SPEED)?;

        let Some(part) = parts.part(&homing.fiducial_part_id) else {
            tracing::info!(
                "TVM920: part {} not configured, skipping fiducial correction",
                homing.fiducial_part_id
            );
            return Ok(());
        };
        let Some(locator) = locator else {
            tracing::warn!("TVM920: no fiducial locator, skipping fiducial correction");
            return Ok(());
        };

        let found = locator
            .refine_location(&expected, &part)?
            .convert_to_units(LengthUnit::Millimeters);
        let x = self.x_position_mm() + (expected.x - found.x);
        let y = self.y_position_mm() + (expected.y - found.y);
        tracing::info!(
            "TVM920: fiducial found at ({:.3}, {:.3}), expected ({:.3}, {:.3})",
            found.x,
            found.y,
            expected.x,
            expected.y
        );
        self.set_xy_position_mm(x, y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fiducial() {
        let config = HomingConfig::default();
        let fiducial = config.fiducial.unwrap();
        assert_eq!((fiducial.x, fiducial.y), (324.0, 112.0));
        assert_eq!(config.fiducial_part_id, "FIDUCIAL-HOME");
        assert_eq!(config.walk_max_steps, 400);
    }
}
