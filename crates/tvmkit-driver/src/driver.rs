//! TVM920 driver facade
//!
//! Translates tool-level requests from a pick-and-place host ("move nozzle
//! NZ2 to this location") into controller moves. Tool offsets are removed,
//! units are converted to millimeters, and the nozzle is resolved to its
//! physical head before anything reaches the [`MotionController`].

use crate::feeders::{FeederBank, FeederSlots};
use crate::location_cache::LocationCache;
use crate::tools::ToolMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tvmkit_communication::{
    HardwareTransport, HeartbeatScheduler, HomingConfig, Link, LinkTiming, MotionController,
    MotionTiming, SimulatedConfig, SimulatedHandle, SimulatedTransport, SpeedBand, Transport,
};
use tvmkit_core::{
    CancellationToken, ControllerError, Error, FiducialLocator, HeadIndex, LengthUnit,
    Location, PartLookup, Result, StaticPartLookup,
};
use tvmkit_settings::Config;

/// Actuator switching the up-looking camera light
pub const UP_CAM_LIGHTS: &str = "UpCamLights";
/// Actuator switching the down-looking camera light
pub const DOWN_CAM_LIGHTS: &str = "DownCamLights";

/// Pick-and-place driver for one TVM920 machine
pub struct Tvm920Driver {
    controller: Arc<MotionController>,
    heartbeat: HeartbeatScheduler,
    tools: ToolMap,
    cache: Mutex<LocationCache>,
    feeders: FeederSlots,
    locator: Option<Arc<dyn FiducialLocator>>,
    parts: Arc<dyn PartLookup>,
    simulator: Option<SimulatedHandle>,
}

impl Tvm920Driver {
    /// Open the transport `config` describes and initialise the controller.
    ///
    /// With `connection.simulated` set, an in-process emulated controller is
    /// used instead of the network.
    pub fn connect(config: &Config) -> Result<Self> {
        let conn = &config.connection;
        let driver = if conn.simulated {
            tracing::info!("TVM920: using simulated controller");
            Self::simulated(config, SimulatedConfig::default())?
        } else {
            let transport = HardwareTransport::connect(&conn.host, conn.port, conn.local_port)?;
            Self::with_transport(config, Box::new(transport))?
        };

        driver.controller.initialize();
        Ok(driver)
    }

    /// Build a driver over an emulated controller. The controller is not
    /// initialised.
    pub fn simulated(config: &Config, machine: SimulatedConfig) -> Result<Self> {
        let transport = SimulatedTransport::new(machine);
        let handle = transport.handle();
        let mut driver = Self::with_transport(config, Box::new(transport))?;
        driver.simulator = Some(handle);
        Ok(driver)
    }

    /// Build a driver over an already open transport. The controller is not
    /// initialised.
    pub fn with_transport(config: &Config, transport: Box<dyn Transport>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::other(format!("Invalid configuration: {}", e)))?;

        let link = Arc::new(Link::new(transport, link_timing(config)));
        let controller = MotionController::new(link.clone(), config.calibration, config.limits)
            .with_timing(motion_timing(config))
            .with_homing(homing_config(config));

        Ok(Self {
            controller: Arc::new(controller),
            heartbeat: HeartbeatScheduler::new(link, config.heartbeat.interval()),
            tools: ToolMap::from_nozzles(&config.nozzles)?,
            cache: Mutex::new(LocationCache::new()),
            feeders: FeederSlots::new(config.feeders.feed_policy),
            locator: None,
            parts: Arc::new(StaticPartLookup::default()),
            simulator: None,
        })
    }

    /// Attach the host's vision and part lookup for homing correction
    pub fn with_collaborators(
        mut self,
        locator: Option<Arc<dyn FiducialLocator>>,
        parts: Arc<dyn PartLookup>,
    ) -> Self {
        self.locator = locator;
        self.parts = parts;
        self
    }

    /// The motion controller
    pub fn controller(&self) -> &Arc<MotionController> {
        &self.controller
    }

    /// Handle onto the emulated controller, when simulating
    pub fn simulator(&self) -> Option<&SimulatedHandle> {
        self.simulator.as_ref()
    }

    /// Token that aborts blocking motion waits
    pub fn cancellation_token(&self) -> CancellationToken {
        self.controller.cancellation_token()
    }

    /// Tools known to the driver
    pub fn tools(&self) -> &ToolMap {
        &self.tools
    }

    /// Home the machine and reset the location cache to the homed position
    pub fn home(&self) -> Result<()> {
        tracing::info!("TVM920: home()");
        self.controller
            .find_home(self.locator.as_deref(), self.parts.as_ref())?;

        let x = self.controller.x_position_mm();
        let y = self.controller.y_position_mm();
        self.cache.lock().homed_at(x, y);
        Ok(())
    }

    /// Move `tool` so that it ends up at `location`.
    ///
    /// NaN coordinates are left where they are. Z and rotation only apply to
    /// nozzles. Z moves first, then the gantry.
    pub fn move_to(&self, tool: &str, location: Location, speed: f64) -> Result<()> {
        tracing::debug!("TVM920: move_to({}, {}, {:.3})", tool, location, speed);
        if !self.check_enabled() {
            tracing::warn!("TVM920: move_to({}) while the heartbeat is stopped", tool);
        }

        let tool = self.tools.resolve(tool)?;
        SpeedBand::for_speed(speed)?;
        let started = Instant::now();

        let target = location
            .subtract(&tool.offset)
            .convert_to_units(LengthUnit::Millimeters);

        if let (Some(head), Some(z)) = (tool.head, target.z_opt()) {
            self.controller.move_z_absolute(head, z, speed)?;
        }

        self.controller.move_xy_theta_absolute(
            target.x_opt(),
            target.y_opt(),
            tool.head,
            target.rotation_opt(),
            speed,
        )?;

        let reached = self.controller.reachable(&target);
        self.cache.lock().record_move(tool.head, &reached);
        tracing::debug!(
            "TVM920: move_to({}) complete in {:?}",
            tool.name,
            started.elapsed()
        );
        Ok(())
    }

    /// Where `tool` was last commanded to, without touching the network
    pub fn get_location(&self, tool: &str) -> Result<Location> {
        let tool = self.tools.resolve(tool)?;
        let offset = tool.offset.convert_to_units(LengthUnit::Millimeters);
        let cache = self.cache.lock();

        let z = match tool.head {
            Some(head) => cache.nozzle_z(head) + offset.z,
            None => 0.0,
        };
        Ok(cache.gantry().add(&offset).derive(None, None, Some(z), None))
    }

    /// Where `tool` is according to the controller. Axes whose cached
    /// position is still current are answered without a status request.
    pub fn read_back_location(&self, tool: &str) -> Result<Location> {
        let tool = self.tools.resolve(tool)?;
        let offset = tool.offset.convert_to_units(LengthUnit::Millimeters);
        let controller = &self.controller;

        let (z, rotation) = match tool.head {
            Some(head) => (
                controller.z_position_mm(head),
                controller.theta_position_deg(head),
            ),
            None => (0.0, 0.0),
        };
        let head_point = Location::new(
            controller.x_position_mm(),
            controller.y_position_mm(),
            z,
            rotation,
        );
        Ok(head_point.add(&offset))
    }

    /// Open the pick valve of `nozzle`
    pub fn pick(&self, nozzle: &str) -> Result<()> {
        tracing::debug!("TVM920: pick({})", nozzle);
        let head = self.nozzle_head(nozzle)?;
        self.controller.pick_open(head.get())
    }

    /// Close the pick valve of `nozzle`
    pub fn place(&self, nozzle: &str) -> Result<()> {
        tracing::debug!("TVM920: place({})", nozzle);
        let head = self.nozzle_head(nozzle)?;
        self.controller.pick_close(head.get())
    }

    fn nozzle_head(&self, nozzle: &str) -> Result<HeadIndex> {
        self.tools.resolve(nozzle)?.head.ok_or_else(|| {
            ControllerError::invalid_argument(format!("{} is not a nozzle", nozzle)).into()
        })
    }

    /// Switch a named on/off actuator
    pub fn actuate(&self, actuator: &str, on: bool) -> Result<()> {
        tracing::debug!("TVM920: actuate({}, {})", actuator, on);
        match actuator {
            UP_CAM_LIGHTS => self.controller.up_light(on),
            DOWN_CAM_LIGHTS => self.controller.down_light(on),
            other => {
                let reason = format!("unknown actuator {}", other);
                return Err(ControllerError::invalid_argument(reason).into());
            }
        }
        Ok(())
    }

    /// Value actuation; the TVM920 has no analog actuators
    pub fn actuate_value(&self, actuator: &str, value: f64) -> Result<()> {
        Err(ControllerError::invalid_argument(format!(
            "actuator {} cannot be set to {}: the TVM920 has no value actuators",
            actuator, value
        ))
        .into())
    }

    /// Start or stop the heartbeat
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        tracing::info!("TVM920: set_enabled({})", enabled);
        if enabled {
            if !self.heartbeat.start() && !self.heartbeat.is_running() {
                return Err(Error::other("heartbeat failed to start"));
            }
        } else {
            self.heartbeat.stop();
        }
        Ok(())
    }

    /// Whether the heartbeat is keeping the controller alive
    pub fn check_enabled(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// Time since the last status was received, if any was
    pub fn status_age(&self) -> Option<Duration> {
        self.controller.link().status_age()
    }

    /// Fire feeder `index`
    pub fn feeder_open(&self, index: usize) -> Result<()> {
        tracing::debug!("TVM920: feeder_open({})", index);
        self.controller.feeder_open(index)
    }

    /// Release every feeder
    pub fn feeders_close_all(&self) -> Result<()> {
        tracing::debug!("TVM920: feeders_close_all()");
        self.controller.feeders_close_all();
        Ok(())
    }

    /// Advance the feeder in a named slot under the configured policy
    pub fn feed(&self, slot: &str) -> Result<()> {
        self.feeders.feed(slot, self)
    }

    /// Release the feeders after a pick
    pub fn post_pick(&self) -> Result<()> {
        self.feeders.post_pick(self)
    }

    /// Location the homing cycle calibrates against
    pub fn home_location(&self) -> Option<Location> {
        self.controller.home_location()
    }

    /// Make the current gantry position the homing fiducial location
    pub fn set_as_home_location(&self) -> Location {
        self.controller.set_as_home_location()
    }

    /// Stop background activity
    pub fn close(&self) {
        self.heartbeat.stop();
    }
}

impl FeederBank for Tvm920Driver {
    fn feeder_open(&self, index: usize) -> Result<()> {
        Tvm920Driver::feeder_open(self, index)
    }

    fn feeders_close_all(&self) -> Result<()> {
        Tvm920Driver::feeders_close_all(self)
    }
}

impl std::fmt::Debug for Tvm920Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tvm920Driver")
            .field("controller", &self.controller)
            .field("heartbeat", &self.heartbeat)
            .field("simulated", &self.simulator.is_some())
            .finish()
    }
}

fn link_timing(config: &Config) -> LinkTiming {
    let conn = &config.connection;
    LinkTiming {
        read_timeout: conn.read_timeout(),
        settle_in_lock: Duration::from_millis(conn.settle_in_lock_ms),
        settle_after_lock: Duration::from_millis(conn.settle_after_lock_ms),
    }
}

fn motion_timing(config: &Config) -> MotionTiming {
    let motion = &config.motion;
    MotionTiming {
        poll_interval: Duration::from_millis(motion.poll_interval_ms),
        motion_timeout: Duration::from_millis(motion.motion_timeout_ms),
        init_step: Duration::from_millis(motion.init_step_ms),
        init_pause: Duration::from_millis(motion.init_pause_ms),
    }
}

fn homing_config(config: &Config) -> HomingConfig {
    HomingConfig {
        fiducial: config.homing.fiducial,
        fiducial_part_id: config.homing.fiducial_part_id.clone(),
        walk_max_steps: config.motion.homing_walk_max_steps,
        walk_settle: Duration::from_millis(config.homing.walk_settle_ms),
    }
}
