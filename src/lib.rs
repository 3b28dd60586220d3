//! # TVMKit
//!
//! Driver for the TVM920 pick-and-place machine.
//!
//! ## Architecture
//!
//! TVMKit is organized as a workspace with multiple crates:
//!
//! 1. **tvmkit-core** - Errors, locations, calibration, collaborator traits
//! 2. **tvmkit-communication** - UDP and simulated transports, the TVM920
//!    datagram codec, motion control, homing, heartbeat
//! 3. **tvmkit-settings** - Machine configuration file and its validation
//! 4. **tvmkit-driver** - Tool offsets, location cache, feeders, the driver facade
//! 5. **tvmkit** - Command-line tool that integrates all crates

pub mod cli;

pub use tvmkit_communication::{
    HardwareTransport, HeartbeatScheduler, HomingConfig, Link, LinkTiming, MotionController,
    MotionTiming, SimulatedConfig, SimulatedHandle, SimulatedTransport, SpeedBand, Transport,
};

pub use tvmkit_core::{
    Axis, CalibrationConstants, CancellationToken, ConnectionError, ControllerError, Error,
    FiducialLocator, HeadIndex, HeadPair, LengthUnit, Location, MachineLimits, Part, PartLookup,
    ProtocolError, Result, StaticPartLookup,
};

pub use tvmkit_driver::{FeederSlots, LocationCache, Tool, ToolMap, Tvm920Driver};

pub use tvmkit_settings::{Config, FeedPolicy, NozzleSettings, SettingsManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    // Logs go to stderr so command output on stdout stays parseable
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
