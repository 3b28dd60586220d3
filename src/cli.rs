//! Command-line front end

use crate::{Config, HeadIndex, Location, SettingsManager, Tvm920Driver};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// Drive a TVM920 pick-and-place machine
#[derive(Parser, Debug, Clone)]
#[command(name = "tvmkit", version)]
pub struct Cli {
    /// Configuration file, TOML or JSON. Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the built-in controller emulation instead of the network
    #[arg(long, global = true)]
    pub simulate: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the machine position
    Status,
    /// Home the machine
    Home,
    /// Home, then move a tool
    #[command(allow_negative_numbers = true)]
    Move {
        /// Tool name, e.g. NZ0 or Camera
        tool: String,
        #[arg(long)]
        x: Option<f64>,
        #[arg(long)]
        y: Option<f64>,
        #[arg(long)]
        z: Option<f64>,
        #[arg(long)]
        rotation: Option<f64>,
        /// Speed fraction in 0.0..=1.0
        #[arg(long, default_value = "0.5")]
        speed: f64,
    },
    /// Run one feed, pick, and place cycle
    #[command(allow_negative_numbers = true)]
    Cycle {
        /// Feeder slot, e.g. F03
        #[arg(long, default_value = "F00")]
        slot: String,
        /// Nozzle doing the pick
        #[arg(long, default_value = "NZ0")]
        nozzle: String,
        /// Pick X
        #[arg(long, default_value = "60.0")]
        pick_x: f64,
        /// Pick Y
        #[arg(long, default_value = "80.0")]
        pick_y: f64,
        /// Place X
        #[arg(long, default_value = "200.0")]
        place_x: f64,
        /// Place Y
        #[arg(long, default_value = "200.0")]
        place_y: f64,
        /// Nozzle depth at pick and place
        #[arg(long, default_value = "-10.0")]
        depth: f64,
    },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(SettingsManager::default_config_path()?),
        }
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        let path = self.config_path()?;
        let mut config = SettingsManager::load_or_default(Some(&path))
            .with_context(|| format!("loading {}", path.display()))?;
        if self.simulate {
            config.connection.simulated = true;
        }
        Ok(config)
    }
}

/// Run one command, writing its report to `out`
pub fn execute(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match &cli.command {
        Command::InitConfig { force } => {
            let path = cli.config_path()?;
            if *force && path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("replacing {}", path.display()))?;
            }
            if SettingsManager::write_default_if_missing(&path)? {
                writeln!(out, "wrote {}", path.display())?;
            } else {
                writeln!(out, "{} already exists", path.display())?;
            }
        }
        Command::Status => {
            let driver = Tvm920Driver::connect(&cli.load_config()?)?;
            report_position(&driver, out)?;
            driver.close();
        }
        Command::Home => {
            let driver = Tvm920Driver::connect(&cli.load_config()?)?;
            driver.home().context("homing failed")?;
            report_position(&driver, out)?;
            driver.close();
        }
        Command::Move {
            tool,
            x,
            y,
            z,
            rotation,
            speed,
        } => {
            let driver = Tvm920Driver::connect(&cli.load_config()?)?;
            driver.home().context("homing failed")?;
            let nan = f64::NAN;
            let target = Location::new(
                x.unwrap_or(nan),
                y.unwrap_or(nan),
                z.unwrap_or(nan),
                rotation.unwrap_or(nan),
            );
            driver.move_to(tool, target, *speed)?;
            writeln!(out, "{} at {}", tool, driver.get_location(tool)?)?;
            driver.close();
        }
        Command::Cycle {
            slot,
            nozzle,
            pick_x,
            pick_y,
            place_x,
            place_y,
            depth,
        } => {
            let driver = Tvm920Driver::connect(&cli.load_config()?)?;
            driver.home().context("homing failed")?;
            driver.set_enabled(true)?;

            let result = run_cycle(
                &driver,
                slot,
                nozzle,
                (*pick_x, *pick_y),
                (*place_x, *place_y),
                *depth,
            );
            driver.close();
            result?;
            writeln!(out, "placed from {} with {}", slot, nozzle)?;
            writeln!(out, "{} at {}", nozzle, driver.get_location(nozzle)?)?;
        }
    }
    Ok(())
}

fn run_cycle(
    driver: &Tvm920Driver,
    slot: &str,
    nozzle: &str,
    pick: (f64, f64),
    place: (f64, f64),
    depth: f64,
) -> anyhow::Result<()> {
    let up = |x: f64, y: f64| Location::new(x, y, 0.0, f64::NAN);
    let down = Location::new(f64::NAN, f64::NAN, depth, f64::NAN);

    driver.feed(slot)?;
    driver.move_to(nozzle, up(pick.0, pick.1), 1.0)?;
    driver.move_to(nozzle, down, 0.5)?;
    driver.pick(nozzle)?;
    driver.move_to(nozzle, up(pick.0, pick.1), 0.5)?;
    driver.post_pick()?;

    driver.move_to(nozzle, up(place.0, place.1), 1.0)?;
    driver.move_to(nozzle, down, 0.5)?;
    driver.place(nozzle)?;
    driver.move_to(nozzle, up(place.0, place.1), 0.5)?;
    Ok(())
}

fn report_position(driver: &Tvm920Driver, out: &mut dyn Write) -> anyhow::Result<()> {
    let controller = driver.controller();
    writeln!(
        out,
        "X {:.3} Y {:.3} homed {}",
        controller.x_position_mm(),
        controller.y_position_mm(),
        controller.is_homed()
    )?;
    for head in HeadIndex::all() {
        writeln!(
            out,
            "head {} Z {:.3} R {:.3}",
            head,
            controller.z_position_mm(head),
            controller.theta_position_deg(head)
        )?;
    }
    Ok(())
}
