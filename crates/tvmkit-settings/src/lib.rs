//! TVMKit Settings Crate
//!
//! Handles the machine configuration file: its sections, validation, and
//! persistence as TOML or JSON in the platform config directory.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{
    Config, ConnectionSettings, FeedPolicy, FeederSettings, HeartbeatSettings, HomingSettings,
    MotionSettings, NozzleSettings,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
pub use manager::SettingsManager;
