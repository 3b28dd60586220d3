//! TVM920 Motion Controller
//!
//! Issues moves, actuation, and configuration requests over a [`Link`] and
//! blocks until the controller reports the motion finished. Every move runs
//! the same sequence: speed table, motion enable, move datagram, poll until
//! stopped, motion disable.
//!
//! Travel limits are only enforced once the machine has homed; before that
//! coordinates are meaningless and the speed is pinned to the homing band.

use super::axis_model::{normalize_theta, AxisModel};
use super::axis_state::{AxisState, AxisStates};
use super::command_creator::{
    self as cmd, AxisCommand, EndStop, GPIO_ALL_PICKS, GPIO_DOWN_LIGHT, GPIO_UP_LIGHT,
    OP_REGISTER,
};
use super::homing::HomingConfig;
use super::speed::SpeedBand;
use super::status_parser::{StatusMessage, TickChannel};
use crate::communication::Link;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tvmkit_core::{
    Axis, CalibrationConstants, CancellationToken, ControllerError, HeadIndex, HeadPair,
    LengthUnit, Location, MachineLimits, ProtocolError, Result,
};

/// Registers read back during initialisation
const INIT_REGISTER_READS: u8 = 48;

/// Polling and pacing of blocking operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionTiming {
    /// Sleep between status polls while waiting for motion to stop
    pub poll_interval: Duration,
    /// Longest wait for a single move to be reported stopped
    pub motion_timeout: Duration,
    /// Pause between initialisation steps
    pub init_step: Duration,
    /// Pause after the initialisation register sweep
    pub init_pause: Duration,
}

impl Default for MotionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            motion_timeout: Duration::from_secs(30),
            init_step: Duration::from_millis(10),
            init_pause: Duration::from_millis(500),
        }
    }
}

/// Phase of the move sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    /// No move in progress
    #[default]
    Idle,
    /// Lockout released, move not yet sent
    MotionEnabled,
    /// Move sent, polling for completion
    Moving,
    /// Lockout re-engaged, caches being refreshed
    MotionDisabled,
}

/// Axes a completion poll waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotionGroup {
    Z,
    Xy { theta: bool },
}

impl MotionGroup {
    fn name(self) -> &'static str {
        match self {
            MotionGroup::Z => "Z",
            MotionGroup::Xy { theta: false } => "XY",
            MotionGroup::Xy { theta: true } => "XY/theta",
        }
    }

    fn is_stopped(self, status: &StatusMessage) -> bool {
        match self {
            MotionGroup::Z => status.is_z_stopped(),
            MotionGroup::Xy { theta } => {
                status.is_xy_stopped() && (!theta || status.is_theta_stopped())
            }
        }
    }
}

/// Whether the drive behind `axis` is idle in `status`
fn axis_stopped(axis: Axis, status: &StatusMessage) -> bool {
    match axis {
        Axis::X | Axis::Y => status.is_xy_stopped(),
        Axis::Z(_) => status.is_z_stopped(),
        Axis::Theta(_) => status.is_theta_stopped(),
    }
}

/// Moves and actuation for one TVM920 controller
pub struct MotionController {
    link: Arc<Link>,
    model: AxisModel,
    limits: MachineLimits,
    timing: MotionTiming,
    pub(super) homing: RwLock<HomingConfig>,
    axes: Mutex<AxisStates>,
    state: Mutex<MotionState>,
    motion: Mutex<()>,
    pub(super) homed: AtomicBool,
    cancel: CancellationToken,
}

impl MotionController {
    /// Create a controller over `link` with default timing and homing
    pub fn new(link: Arc<Link>, calibration: CalibrationConstants, limits: MachineLimits) -> Self {
        Self {
            link,
            model: AxisModel::new(calibration),
            limits,
            timing: MotionTiming::default(),
            homing: RwLock::new(HomingConfig::default()),
            axes: Mutex::new(AxisStates::new()),
            state: Mutex::new(MotionState::Idle),
            motion: Mutex::new(()),
            homed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the polling and pacing parameters
    pub fn with_timing(mut self, timing: MotionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the homing parameters
    pub fn with_homing(self, homing: HomingConfig) -> Self {
        *self.homing.write() = homing;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The link this controller talks through
    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    /// Unit conversions in use
    pub fn model(&self) -> &AxisModel {
        &self.model
    }

    /// Travel limits in use
    pub fn limits(&self) -> &MachineLimits {
        &self.limits
    }

    /// Polling parameters in use
    pub fn timing(&self) -> &MotionTiming {
        &self.timing
    }

    /// Token checked by every blocking poll
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the last homing cycle completed
    pub fn is_homed(&self) -> bool {
        self.homed.load(Ordering::SeqCst)
    }

    /// Where the absolute moves take `target` once limits apply.
    ///
    /// After homing X and Y are clamped to the table, Z to `[min_z, 0]`
    /// and rotation wrapped into `[-180, 180)`. Unspecified coordinates
    /// stay NaN. The result is in millimeters.
    pub fn reachable(&self, target: &Location) -> Location {
        let target = target.convert_to_units(LengthUnit::Millimeters);
        if !self.is_homed() {
            return target;
        }
        Location::new(
            target.x.clamp(0.0, self.limits.max_x),
            target.y.clamp(0.0, self.limits.max_y),
            target.z.clamp(self.limits.min_z, 0.0),
            normalize_theta(target.rotation),
        )
    }

    /// Current phase of the move sequence
    pub fn motion_state(&self) -> MotionState {
        *self.state.lock()
    }

    /// Cached state of one axis
    pub fn axis_state(&self, axis: Axis) -> AxisState {
        self.axes.lock().get(axis)
    }

    // ------------------------------------------------------------------
    // Moves
    // ------------------------------------------------------------------

    /// Move one head's Z to `z` millimeters (0 is home, negative is down).
    ///
    /// Heads sharing a drive move together; the partner head's cached Z is
    /// refreshed as well.
    pub fn move_z_absolute(&self, head: HeadIndex, z: f64, speed: f64) -> Result<()> {
        if z.is_nan() {
            return Ok(());
        }
        let band = self.speed_band(speed)?;
        let pair = head.pair();

        if z == 0.0 && self.axes.lock().is_z_home(pair) {
            tracing::debug!("TVM920: Z{} already home", head);
            return Ok(());
        }

        let z = if self.is_homed() {
            z.clamp(self.limits.min_z, 0.0)
        } else {
            z
        };
        let ticks = self.model.z_mm_to_head_ticks(head, z);
        tracing::debug!(
            "TVM920: move Z{} to {:.3} mm ({} ticks) at {:?}",
            head,
            z,
            ticks,
            band
        );

        let [a, b] = pair.heads();
        let command = AxisCommand::movement().z(pair, ticks);
        let result = self.execute_move(band, &command, MotionGroup::Z, &[Axis::Z(a), Axis::Z(b)]);
        self.axes.lock().set_z_home(pair, result.is_ok() && ticks == 0);
        result
    }

    /// Move one head's Z by `dz` millimeters from where it is
    pub fn move_z_relative(&self, head: HeadIndex, dz: f64, speed: f64) -> Result<()> {
        if dz.is_nan() {
            return Ok(());
        }
        SpeedBand::for_speed(speed)?;
        let z = self.z_position_mm(head) + dz;
        self.move_z_absolute(head, z, speed)
    }

    /// Move the gantry and optionally one head's rotation.
    ///
    /// `None` or NaN leaves that axis alone. A rotation without a head is
    /// ignored. Once homed, X and Y are clamped to the table and theta is
    /// wrapped into `[-180, 180)`.
    pub fn move_xy_theta_absolute(
        &self,
        x: Option<f64>,
        y: Option<f64>,
        head: Option<HeadIndex>,
        theta: Option<f64>,
        speed: f64,
    ) -> Result<()> {
        let x = x.filter(|v| !v.is_nan());
        let y = y.filter(|v| !v.is_nan());
        let theta = match (theta.filter(|v| !v.is_nan()), head) {
            (Some(degrees), Some(head)) => Some((head, degrees)),
            (Some(_), None) => {
                tracing::debug!("TVM920: rotation without a head ignored");
                None
            }
            _ => None,
        };
        if x.is_none() && y.is_none() && theta.is_none() {
            return Ok(());
        }

        let band = self.speed_band(speed)?;
        let homed = self.is_homed();
        let x = x.map(|v| if homed { v.clamp(0.0, self.limits.max_x) } else { v });
        let y = y.map(|v| if homed { v.clamp(0.0, self.limits.max_y) } else { v });
        let theta = theta.map(|(h, t)| (h, if homed { normalize_theta(t) } else { t }));

        tracing::debug!(
            "TVM920: move XY to ({:?}, {:?}) theta {:?} at {:?}",
            x,
            y,
            theta,
            band
        );

        let mut command = AxisCommand::movement();
        let mut axes = Vec::with_capacity(3);
        if let Some(x) = x {
            command = command.x(self.model.x_mm_to_ticks(x));
            axes.push(Axis::X);
        }
        if let Some(y) = y {
            command = command.y(self.model.y_mm_to_ticks(y));
            axes.push(Axis::Y);
        }
        if let Some((head, degrees)) = theta {
            command = command.theta(head, self.model.theta_deg_to_ticks(degrees));
            axes.push(Axis::Theta(head));
        }

        self.send("front panel unlock", &cmd::unlock_front_panel());
        let group = MotionGroup::Xy {
            theta: theta.is_some(),
        };
        self.execute_move(band, &command, group, &axes)
    }

    /// Move the gantry and optionally one head's rotation by the given deltas
    pub fn move_xy_theta_relative(
        &self,
        dx: Option<f64>,
        dy: Option<f64>,
        head: Option<HeadIndex>,
        dtheta: Option<f64>,
        speed: f64,
    ) -> Result<()> {
        SpeedBand::for_speed(speed)?;
        let x = dx.filter(|d| !d.is_nan()).map(|d| d + self.x_position_mm());
        let y = dy.filter(|d| !d.is_nan()).map(|d| d + self.y_position_mm());
        let theta = match (dtheta.filter(|d| !d.is_nan()), head) {
            (Some(d), Some(head)) => Some(d + self.theta_position_deg(head)),
            _ => None,
        };
        self.move_xy_theta_absolute(x, y, head, theta, speed)
    }

    fn speed_band(&self, speed: f64) -> std::result::Result<SpeedBand, ControllerError> {
        let requested = SpeedBand::for_speed(speed)?;
        if self.is_homed() {
            Ok(requested)
        } else {
            SpeedBand::for_speed(self.limits.homing_speed)
        }
    }

    fn execute_move(
        &self,
        band: SpeedBand,
        command: &AxisCommand,
        group: MotionGroup,
        axes: &[Axis],
    ) -> Result<()> {
        let _motion = self.motion.lock();
        self.axes.lock().begin_move(axes);

        self.load_speed_table(band);
        self.send("motion enable", &cmd::motion_enable(true));
        self.set_state(MotionState::MotionEnabled);

        self.send("move", command.as_bytes());
        let issued = self.link.status().generation();
        self.set_state(MotionState::Moving);

        let result = self.wait_until_stopped(group, issued);
        if let Err(e) = &result {
            tracing::error!("TVM920: {} move did not complete: {}", group.name(), e);
        }

        self.send("motion disable", &cmd::motion_enable(false));
        self.set_state(MotionState::MotionDisabled);

        let snapshot = self.link.status().snapshot();
        let confirmed = result.is_ok() && snapshot.generation > issued;
        {
            let mut states = self.axes.lock();
            states.end_move(axes);
            for &axis in axes {
                let position = self.position_from_status(axis, &snapshot.message);
                states.record(axis, position, confirmed);
            }
        }

        self.set_state(MotionState::Idle);
        result.map_err(Into::into)
    }

    /// Poll until `group` reports stopped in a status newer than `issued`
    fn wait_until_stopped(
        &self,
        group: MotionGroup,
        issued: u64,
    ) -> std::result::Result<(), ControllerError> {
        let deadline = Instant::now() + self.timing.motion_timeout;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }

            if self.link.request_status() {
                let snapshot = self.link.status().snapshot();
                if snapshot.generation > issued && group.is_stopped(&snapshot.message) {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(ControllerError::MotionTimeout {
                    group: group.name().to_string(),
                    timeout_ms: self.timing.motion_timeout.as_millis() as u64,
                });
            }
            pause(self.timing.poll_interval);
        }
    }

    fn set_state(&self, state: MotionState) {
        *self.state.lock() = state;
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    /// X in millimeters
    pub fn x_position_mm(&self) -> f64 {
        self.position(Axis::X)
    }

    /// Y in millimeters
    pub fn y_position_mm(&self) -> f64 {
        self.position(Axis::Y)
    }

    /// Z of one head in millimeters
    pub fn z_position_mm(&self, head: HeadIndex) -> f64 {
        self.position(Axis::Z(head))
    }

    /// Rotation of one head in degrees
    pub fn theta_position_deg(&self, head: HeadIndex) -> f64 {
        self.position(Axis::Theta(head))
    }

    /// Position of any axis, from cache when it is fresh.
    ///
    /// Otherwise a status is requested. If none arrives the last known
    /// status is used and the axis stays stale.
    pub fn position(&self, axis: Axis) -> f64 {
        let cached = self.axes.lock().get(axis);
        if !cached.needs_refresh() {
            return cached.position;
        }

        let fresh = self.link.request_status();
        let status = self.link.status().message();
        let position = self.position_from_status(axis, &status);
        let confirmed = fresh && axis_stopped(axis, &status);
        self.axes.lock().record(axis, position, confirmed);
        tracing::trace!("TVM920: {} read back as {:.3}", axis, position);
        position
    }

    fn position_from_status(&self, axis: Axis, status: &StatusMessage) -> f64 {
        match axis {
            Axis::X => self.model.x_ticks_to_mm(status.ticks(TickChannel::X)),
            Axis::Y => self.model.y_ticks_to_mm(status.ticks(TickChannel::Y)),
            Axis::Z(head) => self
                .model
                .z_head_ticks_to_mm(head, status.ticks(TickChannel::Z(head.pair()))),
            Axis::Theta(head) => self
                .model
                .theta_ticks_to_deg(status.ticks(TickChannel::Theta(head))),
        }
    }

    /// Overwrite the controller's idea of the gantry position
    pub fn set_xy_position_mm(&self, x: f64, y: f64) {
        tracing::info!("TVM920: setting XY position to ({:.3}, {:.3})", x, y);
        let command = AxisCommand::set_position()
            .x(self.model.x_mm_to_ticks(x))
            .y(self.model.y_mm_to_ticks(y));
        self.send("position set", command.as_bytes());

        let mut states = self.axes.lock();
        states.invalidate(Axis::X);
        states.invalidate(Axis::Y);
    }

    /// Declare both Z drives to be at zero
    pub fn zero_all_z(&self) {
        tracing::debug!("TVM920: zeroing all Z");
        let command = AxisCommand::set_position()
            .z(HeadPair::Z01, 0)
            .z(HeadPair::Z23, 0);
        self.send("position set", command.as_bytes());

        let mut states = self.axes.lock();
        for head in HeadIndex::all() {
            states.record(Axis::Z(head), 0.0, true);
            states.set_z_home(head.pair(), true);
        }
    }

    /// Location the homing cycle calibrates against
    pub fn home_location(&self) -> Option<Location> {
        self.homing.read().fiducial
    }

    /// Make the current gantry position the homing fiducial location
    pub fn set_as_home_location(&self) -> Location {
        let location = Location::new(self.x_position_mm(), self.y_position_mm(), 0.0, 0.0);
        tracing::info!("TVM920: home fiducial location set to {}", location);
        self.homing.write().fiducial = Some(location);
        location
    }

    // ------------------------------------------------------------------
    // Actuation
    // ------------------------------------------------------------------

    /// Load the speed table for `speed`, subject to the pre-homing lock
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        let band = self.speed_band(speed)?;
        self.load_speed_table(band);
        Ok(())
    }

    fn load_speed_table(&self, band: SpeedBand) {
        self.send("speed table", band.table());
    }

    /// Release or engage the motion lockout
    pub fn set_motion_enabled(&self, enable: bool) {
        self.send("motion enable", &cmd::motion_enable(enable));
    }

    /// Fire one front feeder, 0..=27
    pub fn feeder_open(&self, index: usize) -> Result<()> {
        let datagram = cmd::feeder_open(index)?;
        tracing::debug!("TVM920: feeder {} open", index);
        self.send("feeder open", &datagram);
        Ok(())
    }

    /// Release every feeder
    pub fn feeders_close_all(&self) {
        self.send("feeders close", &cmd::feeders_close_all());
    }

    /// Open one head's pick valve, 0..=3
    pub fn pick_open(&self, index: usize) -> Result<()> {
        let mask = cmd::pick_mask(index)?;
        self.send("pick open", &cmd::gpio(true, mask));
        Ok(())
    }

    /// Close one head's pick valve, 0..=3
    pub fn pick_close(&self, index: usize) -> Result<()> {
        let mask = cmd::pick_mask(index)?;
        self.send("pick close", &cmd::gpio(false, mask));
        Ok(())
    }

    /// Close every pick valve
    pub fn pick_close_all(&self) {
        self.send("pick close", &cmd::gpio(false, GPIO_ALL_PICKS));
    }

    /// Switch the up-looking camera light. The down light is always
    /// switched off first.
    pub fn up_light(&self, on: bool) {
        self.send("light", &cmd::gpio(false, GPIO_DOWN_LIGHT));
        self.send("light", &cmd::gpio(on, GPIO_UP_LIGHT));
    }

    /// Switch the down-looking camera light. The up light is always
    /// switched off first.
    pub fn down_light(&self, on: bool) {
        self.send("light", &cmd::gpio(false, GPIO_UP_LIGHT));
        self.send("light", &cmd::gpio(on, GPIO_DOWN_LIGHT));
    }

    /// Read a controller register
    pub fn read_register(&self, register: u16) -> Result<u32> {
        let reply = self.link.send_receive(&cmd::register_read(register))?;
        match reply.first() {
            Some(&OP_REGISTER) => {}
            Some(&actual) => {
                return Err(ProtocolError::UnexpectedOpcode {
                    expected: OP_REGISTER,
                    actual,
                }
                .into())
            }
            None => {
                return Err(ControllerError::NoResponse {
                    command: format!("register 0x{:04X} read", register),
                }
                .into())
            }
        }
        cmd::parse_register_reply(&reply).ok_or_else(|| {
            ProtocolError::ResponseTooShort {
                opcode: OP_REGISTER,
                len: reply.len(),
                required: 12,
            }
            .into()
        })
    }

    /// Write a controller register
    pub fn write_register(&self, register: u16, value: u32) {
        self.send("register write", &cmd::register_write(register, value));
    }

    /// Enable or release one end stop
    pub fn set_end_stop(&self, stop: EndStop, enable: bool) {
        self.send("end stop", &cmd::end_stop(stop, enable));
    }

    /// Enable or release every end stop
    pub fn set_all_end_stops(&self, enable: bool) {
        for stop in EndStop::ALL {
            self.set_end_stop(stop, enable);
        }
    }

    /// Bring a freshly powered controller into the state the stock
    /// software leaves it in. Failures are logged and skipped.
    pub fn initialize(&self) {
        tracing::info!("TVM920: initialising controller over {}", self.link.name());
        let step = self.timing.init_step;

        self.send("status", &cmd::status_request());
        pause(step);
        self.send("gpio clear", &cmd::gpio(false, 0x10));
        pause(step);
        self.query_end_stops(step);
        self.load_speed_table(SpeedBand::Pct50);
        pause(step);

        for index in 0..INIT_REGISTER_READS {
            self.send("register read", &cmd::register_read(u16::from(index) << 8));
            pause(step);
        }
        pause(self.timing.init_pause);

        self.send("motion disable", &cmd::motion_enable(false));
        pause(step);
        self.send("gpio clear", &cmd::gpio(false, 0x30));
        pause(step);
        self.query_end_stops(step);
        self.send("gpio set", &cmd::gpio(true, GPIO_UP_LIGHT));
        pause(step);
        self.send("gpio clear", &cmd::gpio(false, 0x50));
        pause(step);

        tracing::info!("TVM920: initialisation complete");
    }

    fn query_end_stops(&self, step: Duration) {
        for stop in [EndStop::Y, EndStop::X] {
            self.send("register query", &cmd::register_query(stop.register()));
            pause(step);
        }
    }

    /// Exchange a datagram whose reply carries nothing we need. A missing
    /// reply is logged and otherwise ignored.
    fn send(&self, what: &str, datagram: &[u8]) -> Option<Vec<u8>> {
        match self.link.send_receive(datagram) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!("TVM920: no reply to {}: {}", what, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for MotionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionController")
            .field("link", &self.link)
            .field("homed", &self.is_homed())
            .field("state", &self.motion_state())
            .finish()
    }
}

pub(super) fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{LinkTiming, SimulatedConfig, SimulatedTransport};

    fn controller() -> (MotionController, crate::communication::SimulatedHandle) {
        let transport = SimulatedTransport::new(SimulatedConfig::default());
        let handle = transport.handle();
        let link = Arc::new(Link::new(
            Box::new(transport),
            LinkTiming::immediate(Duration::from_millis(1)),
        ));
        let timing = MotionTiming {
            poll_interval: Duration::ZERO,
            motion_timeout: Duration::from_secs(2),
            init_step: Duration::ZERO,
            init_pause: Duration::ZERO,
        };
        let controller = MotionController::new(
            link,
            CalibrationConstants::default(),
            MachineLimits::default(),
        )
        .with_timing(timing);
        (controller, handle)
    }

    fn head(i: usize) -> HeadIndex {
        HeadIndex::new(i).unwrap()
    }

    #[test]
    fn test_motion_group_predicates() {
        let status = StatusMessage::neutral();
        assert!(MotionGroup::Z.is_stopped(&status));
        assert!(MotionGroup::Xy { theta: true }.is_stopped(&status));
        assert_eq!(MotionGroup::Xy { theta: true }.name(), "XY/theta");
    }

    #[test]
    fn test_xy_move_round_trip_through_simulator() {
        let (controller, handle) = controller();
        controller
            .move_xy_theta_absolute(Some(100.0), Some(50.0), None, None, 1.0)
            .unwrap();

        assert_eq!(handle.ticks(TickChannel::X), 32_755);
        assert!(!handle.motion_enabled());
        assert_eq!(controller.motion_state(), MotionState::Idle);

        let state = controller.axis_state(Axis::X);
        assert!(!state.needs_refresh());
        assert!((state.position - 100.0).abs() < 0.01);
        assert!((controller.y_position_mm() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_z_move_refreshes_partner_head() {
        let (controller, _) = controller();
        controller.move_z_absolute(head(0), -5.0, 0.5).unwrap();

        assert!((controller.z_position_mm(head(0)) + 5.0).abs() < 0.05);
        assert!(!controller.axis_state(Axis::Z(head(1))).needs_refresh());
        assert!((controller.z_position_mm(head(1)) - 5.0).abs() < 0.05);
    }

    #[test]
    fn test_z_home_short_circuit() {
        let (controller, handle) = controller();
        controller.zero_all_z();
        controller.move_z_absolute(head(2), 0.0, 0.5).unwrap();
        assert_eq!(handle.move_count(), 0);

        controller.move_z_absolute(head(2), -1.0, 0.5).unwrap();
        controller.move_z_absolute(head(2), 0.0, 0.5).unwrap();
        assert_eq!(handle.move_count(), 2);
    }

    #[test]
    fn test_pre_home_speed_is_locked() {
        let (controller, handle) = controller();
        controller.move_z_absolute(head(0), -1.0, 1.0).unwrap();
        assert_eq!(handle.speed_class(), Some(SpeedBand::SAFE.table()[2]));

        controller.homed.store(true, Ordering::SeqCst);
        controller.move_z_absolute(head(0), -2.0, 1.0).unwrap();
        assert_eq!(handle.speed_class(), Some(SpeedBand::Pct80.table()[2]));
    }

    #[test]
    fn test_invalid_speed_sends_nothing() {
        let (controller, handle) = controller();
        let err = controller.move_z_absolute(head(0), -1.0, 1.5).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(handle.speed_class(), None);
    }

    #[test]
    fn test_dropped_replies_time_out() {
        let (controller, handle) = controller();
        let timing = MotionTiming {
            motion_timeout: Duration::from_millis(30),
            ..*controller.timing()
        };
        let controller = controller.with_timing(timing);
        handle.drop_replies(u32::MAX);
        let err = controller
            .move_xy_theta_absolute(Some(1.0), None, None, None, 0.5)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(controller.axis_state(Axis::X).stale);
        assert_eq!(controller.motion_state(), MotionState::Idle);
    }

    #[test]
    fn test_cancelled_move() {
        let (controller, _) = controller();
        controller.cancellation_token().cancel();
        let err = controller
            .move_xy_theta_absolute(Some(1.0), None, None, None, 0.5)
            .unwrap_err();
        assert!(matches!(
            err,
            tvmkit_core::Error::Controller(ControllerError::Cancelled)
        ));
    }

    #[test]
    fn test_lights_and_picks() {
        let (controller, handle) = controller();
        controller.down_light(true);
        assert_eq!(handle.gpio(), GPIO_DOWN_LIGHT);
        controller.up_light(true);
        assert_eq!(handle.gpio(), GPIO_UP_LIGHT);

        controller.pick_open(2).unwrap();
        assert_eq!(handle.gpio() & GPIO_ALL_PICKS, 0x04);
        controller.pick_close_all();
        assert_eq!(handle.gpio() & GPIO_ALL_PICKS, 0);
        assert!(controller.pick_open(4).is_err());
    }

    #[test]
    fn test_register_access() {
        let (controller, _) = controller();
        controller.write_register(0x10F4, 7);
        assert_eq!(controller.read_register(0x10F4).unwrap(), 7);
    }

    #[test]
    fn test_initialize_leaves_lockout_engaged() {
        let (controller, handle) = controller();
        controller.initialize();
        assert!(!handle.motion_enabled());
        assert_eq!(handle.gpio(), GPIO_UP_LIGHT);
        assert_eq!(handle.speed_class(), Some(SpeedBand::Pct50.table()[2]));
    }
}
