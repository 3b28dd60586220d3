mod common;

use common::{fast_homing, simulated_controller};
use tvmkit_communication::{EndStop, HomingConfig, SimulatedConfig, TickChannel};
use tvmkit_core::{
    ControllerError, Error, FiducialLocator, HeadPair, Location, Part, Result, StaticPartLookup,
};

/// Reports the fiducial at a fixed offset from where it was expected
struct OffsetLocator {
    dx: f64,
    dy: f64,
}

impl FiducialLocator for OffsetLocator {
    fn refine_location(&self, expected: &Location, _part: &Part) -> Result<Location> {
        Ok(expected.add(&Location::new(self.dx, self.dy, 0.0, 0.0)))
    }
}

struct FailingLocator;

impl FiducialLocator for FailingLocator {
    fn refine_location(&self, _expected: &Location, part: &Part) -> Result<Location> {
        Err(Error::other(format!("{} not visible", part.id)))
    }
}

fn fiducial_parts() -> StaticPartLookup {
    StaticPartLookup::new(["FIDUCIAL-HOME"])
}

#[test]
fn test_homing_without_vision() {
    let (controller, handle) = simulated_controller(SimulatedConfig::default());
    controller
        .find_home(None, &StaticPartLookup::default())
        .unwrap();

    assert!(controller.is_homed());
    // Z drives were zeroed with the switches made
    assert_eq!(handle.ticks(TickChannel::Z(HeadPair::Z01)), 0);
    assert_eq!(handle.ticks(TickChannel::Z(HeadPair::Z23)), 0);
    // End stops are armed again
    for stop in EndStop::ALL {
        assert_eq!(handle.register(stop.register()), 0);
    }
    // Parked over the nominal fiducial location
    assert!((controller.x_position_mm() - 324.0).abs() < 0.01);
    assert!((controller.y_position_mm() - 112.0).abs() < 0.01);
}

#[test]
fn test_fiducial_correction_shifts_origin() {
    let (controller, _) = simulated_controller(SimulatedConfig::default());
    let locator = OffsetLocator { dx: 1.0, dy: -2.0 };
    controller
        .find_home(Some(&locator), &fiducial_parts())
        .unwrap();

    assert!(controller.is_homed());
    assert!((controller.x_position_mm() - 323.0).abs() < 0.01);
    assert!((controller.y_position_mm() - 114.0).abs() < 0.01);
}

#[test]
fn test_missing_fiducial_part_skips_vision() {
    let (controller, _) = simulated_controller(SimulatedConfig::default());
    let locator = OffsetLocator { dx: 5.0, dy: 5.0 };
    controller
        .find_home(Some(&locator), &StaticPartLookup::default())
        .unwrap();
    assert!((controller.x_position_mm() - 324.0).abs() < 0.01);
}

#[test]
fn test_vision_failure_leaves_machine_unhomed() {
    let (controller, _) = simulated_controller(SimulatedConfig::default());
    let err = controller
        .find_home(Some(&FailingLocator), &fiducial_parts())
        .unwrap_err();
    assert!(err.to_string().contains("not visible"));
    assert!(!controller.is_homed());
}

#[test]
fn test_out_of_table_fiducial_is_skipped() {
    let (controller, _) = simulated_controller(SimulatedConfig::default());
    let controller = controller.with_homing(HomingConfig {
        fiducial: Some(Location::new(900.0, 112.0, 0.0, 0.0)),
        ..fast_homing()
    });
    controller
        .find_home(Some(&FailingLocator), &fiducial_parts())
        .unwrap();

    assert!(controller.is_homed());
    // Left where the gantry backed off its end stops
    let limits = *controller.limits();
    assert!((controller.x_position_mm() - (limits.max_x - 5.0)).abs() < 0.01);
    assert!((controller.y_position_mm() - (limits.max_y - 5.0)).abs() < 0.01);
}

#[test]
fn test_z_switch_never_made_fails_homing() {
    let config = SimulatedConfig {
        z_home_window_ticks: -1,
        ..SimulatedConfig::default()
    };
    let (controller, _) = simulated_controller(config);
    let controller = controller.with_homing(HomingConfig {
        walk_max_steps: 5,
        ..fast_homing()
    });

    let err = controller
        .find_home(None, &StaticPartLookup::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Controller(ControllerError::HomingFailed { .. })
    ));
    assert!(!controller.is_homed());
}

#[test]
fn test_set_as_home_location() {
    let (controller, _) = simulated_controller(SimulatedConfig::default());
    controller
        .move_xy_theta_absolute(Some(200.0), Some(150.0), None, None, 0.4)
        .unwrap();

    let location = controller.set_as_home_location();
    assert!((location.x - 200.0).abs() < 0.01);
    assert_eq!(controller.home_location(), Some(location));
}
