//! slconfig - SeaMaster SearchLight configuration tool
//!
//! Reads the controller's configuration over a serial line, lets the operator
//! edit single fields, and backs the configuration up to (or restores it
//! from) a file.

mod config;
mod session;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use slc_protocol::{DeviceSimulator, ExchangeEngine, ProtocolVariant, SerialTransport, Transport};
use tracing::info;

use crate::config::{CliOverrides, SlconfigConfig};
use crate::session::{BackupSettings, Session};

const BANNER: &str = "SeaMaster SearchLight configuration tool";

/// Accepts `3`, `:3` (as in `-P:3`) and `=3`
fn parse_flag_number(value: &str) -> std::result::Result<u32, String> {
    let digits = value.trim_start_matches([':', '=']);
    digits
        .parse()
        .map_err(|_| format!("'{value}' is not a positive number"))
}

#[derive(Parser, Debug)]
#[command(name = "slconfig")]
#[command(about = BANNER)]
#[command(version, disable_help_flag = true)]
struct Cli {
    /// Serial port number (COM<n> on Windows, /dev/ttyS<n-1> elsewhere)
    #[arg(short = 'P', short_alias = 'p', long = "port", value_name = "N", value_parser = parse_flag_number)]
    port: Option<u32>,

    /// Baud rate
    #[arg(short = 'B', short_alias = 'b', long = "baud", value_name = "RATE", value_parser = parse_flag_number)]
    baud: Option<u32>,

    /// Serial device path; overrides --port
    #[arg(long, value_name = "PATH")]
    device: Option<String>,

    /// Protocol variant: full (8 fields) or reduced (7 fields)
    #[arg(long, value_name = "VARIANT")]
    variant: Option<ProtocolVariant>,

    /// Configuration file (YAML or TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "slc_protocol=debug"
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Talk to a built-in simulated controller instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Show usage
    #[arg(short = 'H', short_alias = 'h', long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            baud_rate: self.baud,
            device: self.device.clone(),
            variant: self.variant,
            log_level: self.log_level.clone(),
        }
    }
}

fn main() {
    println!("{BANNER}");

    // Usage errors and -H print usage; the exit status stays 0 either way
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return;
        },
    };

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(&cli) {
        eprintln!("{} {e:#}", "ERROR".red());
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config =
        SlconfigConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(&cli.overrides());
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    common::init_with_config(&config.log_config()).context("Failed to initialize logging")?;

    let variant = config.protocol.variant;
    let transport: Box<dyn Transport> = if cli.simulate {
        println!("{}", "Simulated controller ready".bright_cyan());
        Box::new(DeviceSimulator::new(variant))
    } else {
        match SerialTransport::open(config.serial_transport_config()) {
            Ok(port) => {
                println!("{} opened", port.name().bright_cyan());
                Box::new(port)
            },
            Err(e) => {
                println!("{}", e.to_string().red());
                return Ok(());
            },
        }
    };
    info!("Session start: variant={variant} transport={}", transport.name());

    let engine = ExchangeEngine::new(variant, config.exchange_config());
    let backup = BackupSettings {
        default_file: config.backup.default_file.clone(),
        size_policy: config.backup.size_policy,
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut session = Session::new(engine, transport, backup, stdin.lock(), stdout.lock());
    session.run()?;
    info!("Session end: last record {:?}", session.record().values());
    Ok(())
}
