//! Configuration model for TVMKit
//!
//! One file describes one machine. It is organized into sections:
//! - Connection (controller address, exchange timing, simulation)
//! - Calibration and travel limits
//! - Motion polling and heartbeat pacing
//! - Homing fiducial
//! - Nozzle offsets and feeder policy
//!
//! Files are JSON or TOML, chosen by extension. Every section defaults, so a
//! file only needs the values that differ from the stock machine.

use crate::error::{ConfigError, ConfigResult, SettingsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tvmkit_core::{CalibrationConstants, Location, MachineLimits, HEAD_COUNT};

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Controller host name or IPv4 address
    pub host: String,
    /// Controller UDP port
    pub port: u16,
    /// Local UDP port to bind
    pub local_port: u16,
    /// How long to wait for each reply
    pub read_timeout_ms: u64,
    /// Pause before another exchange may start
    pub settle_in_lock_ms: u64,
    /// Pause after the link is released
    pub settle_after_lock_ms: u64,
    /// Talk to the in-process emulated controller instead of hardware
    pub simulated: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "192.168.0.8".to_string(),
            port: 8701,
            local_port: 8701,
            read_timeout_ms: 100,
            settle_in_lock_ms: 3,
            settle_after_lock_ms: 2,
            simulated: false,
        }
    }
}

impl ConnectionSettings {
    /// Reply timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Motion polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Sleep between status polls while waiting for a move
    pub poll_interval_ms: u64,
    /// Longest wait for one move to finish
    pub motion_timeout_ms: u64,
    /// Most steps one Z homing walk may take
    pub homing_walk_max_steps: u32,
    /// Pause between controller initialisation steps
    pub init_step_ms: u64,
    /// Pause after the initialisation register sweep
    pub init_pause_ms: u64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            motion_timeout_ms: 30_000,
            homing_walk_max_steps: 400,
            init_step_ms: 10,
            init_pause_ms: 500,
        }
    }
}

/// Heartbeat settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    /// Interval between status polls
    pub interval_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self { interval_ms: 50 }
    }
}

impl HeartbeatSettings {
    /// Poll interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Homing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingSettings {
    /// Where the homing fiducial sits once the axes are homed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiducial: Option<Location>,
    /// Part id the host must define for vision correction to run
    pub fiducial_part_id: String,
    /// Pause after each Z walk step
    pub walk_settle_ms: u64,
}

impl Default for HomingSettings {
    fn default() -> Self {
        Self {
            fiducial: Some(Location::new(324.0, 112.0, 0.0, 0.0)),
            fiducial_part_id: "FIDUCIAL-HOME".to_string(),
            walk_settle_ms: 50,
        }
    }
}

/// One nozzle and where it sits relative to the head reference point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NozzleSettings {
    /// Tool name, conventionally `NZ0`..`NZ3`
    pub name: String,
    /// Physical head the nozzle is mounted on
    pub head: usize,
    /// Offset from the head reference point
    pub offset: Location,
}

impl NozzleSettings {
    /// Nozzle `NZ{head}` at the given XY offset
    pub fn new(head: usize, offset_x: f64, offset_y: f64) -> Self {
        Self {
            name: format!("NZ{}", head),
            head,
            offset: Location::new(offset_x, offset_y, 0.0, 0.0),
        }
    }

    /// The stock four-nozzle layout
    pub fn stock() -> Vec<Self> {
        const BASE_X: f64 = -38.8;
        const BASE_Y: f64 = -59.8;
        [0.0, 25.6, 50.2, 75.5]
            .iter()
            .enumerate()
            .map(|(head, spacing)| Self::new(head, BASE_X + spacing, BASE_Y))
            .collect()
    }
}

/// How a repeated feed request on the same feeder is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPolicy {
    /// A second feed of the open feeder closes it
    #[default]
    PushPush,
    /// Every feed closes all feeders and then opens the requested one
    CloseThenOpen,
}

impl std::fmt::Display for FeedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PushPush => write!(f, "push_push"),
            Self::CloseThenOpen => write!(f, "close_then_open"),
        }
    }
}

/// Feeder settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederSettings {
    /// Toggle behaviour of slot feeders
    pub feed_policy: FeedPolicy,
}

/// Complete machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Unit conversion constants
    pub calibration: CalibrationConstants,
    /// Travel limits
    pub limits: MachineLimits,
    /// Motion polling
    pub motion: MotionSettings,
    /// Heartbeat pacing
    pub heartbeat: HeartbeatSettings,
    /// Homing fiducial
    pub homing: HomingSettings,
    /// Nozzle layout
    pub nozzles: Vec<NozzleSettings>,
    /// Feeder policy
    pub feeders: FeederSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            calibration: CalibrationConstants::default(),
            limits: MachineLimits::default(),
            motion: MotionSettings::default(),
            heartbeat: HeartbeatSettings::default(),
            homing: HomingSettings::default(),
            nozzles: NozzleSettings::stock(),
            feeders: FeederSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn for_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML) and validate it
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::for_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate and save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = Format::for_path(path)?;

        let content = match format {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)?;
        tracing::debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        // Connection
        if self.connection.host.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "connection.host".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.connection.read_timeout_ms == 0 {
            return Err(ConfigError::out_of_range("connection.read_timeout_ms", 0));
        }

        // Calibration
        let cal = &self.calibration;
        for (key, value) in [
            ("calibration.ticks_per_mm_x", cal.ticks_per_mm_x),
            ("calibration.ticks_per_mm_y", cal.ticks_per_mm_y),
            ("calibration.ticks_per_mm_z", cal.ticks_per_mm_z),
            ("calibration.ticks_per_degree", cal.ticks_per_degree),
            ("calibration.z_arm_length", cal.z_arm_length),
        ] {
            positive(key, value)?;
        }

        // Limits
        let limits = &self.limits;
        positive("limits.max_x", limits.max_x)?;
        positive("limits.max_y", limits.max_y)?;
        if !(limits.min_z <= 0.0 && limits.min_z >= -2.0 * cal.z_arm_length) {
            return Err(ConfigError::out_of_range("limits.min_z", limits.min_z));
        }
        if !(limits.homing_speed > 0.0 && limits.homing_speed <= 1.0) {
            return Err(ConfigError::out_of_range(
                "limits.homing_speed",
                limits.homing_speed,
            ));
        }

        // Pacing
        if self.motion.motion_timeout_ms == 0 {
            return Err(ConfigError::out_of_range("motion.motion_timeout_ms", 0));
        }
        if self.motion.homing_walk_max_steps == 0 {
            return Err(ConfigError::out_of_range("motion.homing_walk_max_steps", 0));
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(ConfigError::out_of_range("heartbeat.interval_ms", 0));
        }

        self.validate_nozzles()
    }

    fn validate_nozzles(&self) -> ConfigResult<()> {
        let mut names = HashSet::new();
        for nozzle in &self.nozzles {
            if nozzle.head >= HEAD_COUNT {
                return Err(ConfigError::out_of_range(
                    &format!("nozzles.{}.head", nozzle.name),
                    nozzle.head,
                ));
            }
            if !names.insert(nozzle.name.as_str()) {
                return Err(ConfigError::InvalidSetting {
                    key: format!("nozzles.{}", nozzle.name),
                    reason: "duplicate nozzle name".to_string(),
                });
            }
            let offset = &nozzle.offset;
            if [offset.x, offset.y, offset.z].iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::InvalidSetting {
                    key: format!("nozzles.{}.offset", nozzle.name),
                    reason: "offsets must be finite".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Nozzle by tool name
    pub fn nozzle(&self, name: &str) -> Option<&NozzleSettings> {
        self.nozzles.iter().find(|n| n.name == name)
    }
}

fn positive(key: &str, value: f64) -> ConfigResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.port, 8701);
        assert_eq!(config.heartbeat.interval(), Duration::from_millis(50));
        assert_eq!(config.feeders.feed_policy, FeedPolicy::PushPush);
    }

    #[test]
    fn test_stock_nozzles() {
        let nozzles = NozzleSettings::stock();
        assert_eq!(nozzles.len(), 4);
        assert_eq!(nozzles[0].name, "NZ0");
        assert!((nozzles[0].offset.x + 38.8).abs() < 1e-9);
        assert!((nozzles[3].offset.x - (-38.8 + 75.5)).abs() < 1e-9);
        assert!(nozzles.iter().all(|n| (n.offset.y + 59.8).abs() < 1e-9));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.limits.min_z = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange { ref key, .. }) if key == "limits.min_z"
        ));

        let mut config = Config::default();
        config.limits.homing_speed = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.calibration.ticks_per_degree = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motion.motion_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.nozzles.push(NozzleSettings::new(1, 0.0, 0.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { .. })
        ));

        let mut config = Config::default();
        config.nozzles[2].head = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            simulated = true

            [feeders]
            feed_policy = "close_then_open"
            "#,
        )
        .unwrap();

        assert!(config.connection.simulated);
        assert_eq!(config.connection.host, "192.168.0.8");
        assert_eq!(config.feeders.feed_policy, FeedPolicy::CloseThenOpen);
        assert_eq!(config.nozzles.len(), 4);
        assert_eq!(config.limits, MachineLimits::default());
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            Format::for_path(Path::new("machine.yaml")),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
        assert_eq!(Format::for_path(Path::new("a.toml")).unwrap(), Format::Toml);
    }

    #[test]
    fn test_nozzle_lookup() {
        let config = Config::default();
        assert_eq!(config.nozzle("NZ2").map(|n| n.head), Some(2));
        assert!(config.nozzle("NZ9").is_none());
    }
}
