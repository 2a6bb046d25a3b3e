//! Glitch Controller
//!
//! Host-side controller for a serial-attached voltage glitcher. Sweeps the
//! glitch delay and pulse width over configured ranges, triggers one glitch
//! per combination, and echoes everything the glitcher prints.
//!
//! # Usage
//!
//! ```bash
//! # Sweep delay 1..100 and pulse 1..100, device power-cycles the target
//! glitch-controller /dev/ttyACM0
//!
//! # Narrow sweep, host waits for the completion marker after each glitch
//! glitch-controller /dev/ttyACM0 -d 200 400 5 -p 1 20 1 --pwr-cycling disabled
//!
//! # Take settings from a file and keep a timestamped capture of the output
//! glitch-controller --config glitch.toml --capture run.log
//!
//! # List available serial ports
//! glitch-controller --list-ports
//! ```

mod config;
mod error;
mod glitch;
mod serial;
mod signal;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use config::Settings;
use glitch::{PowerCycling, SweepController, SweepExit, SweepRange};
use serial::{Listener, OutputSink, SerialConnection};

/// Glitch Controller
///
/// Control the glitcher over serial
#[derive(Parser)]
#[command(name = "glitch-controller")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Control the glitcher over serial")]
struct Cli {
    /// Serial port to connect to (e.g., /dev/ttyACM0)
    #[arg(value_name = "SERIALPORT", required_unless_present_any = ["list_ports", "config"])]
    port: Option<String>,

    /// Baud rate [default: 115200]
    #[arg(long)]
    baudrate: Option<u32>,

    /// Timeout of the serial connection in seconds, also the pacing between glitches [default: 0.1]
    #[arg(long)]
    timeout: Option<f64>,

    /// Delay sweep [default: 1 100 1]
    #[arg(short = 'd', num_args = 3, value_names = ["START", "STOP", "STEP"], allow_negative_numbers = true)]
    delay: Option<Vec<i64>>,

    /// Pulse width sweep [default: 1 100 1]
    #[arg(short = 'p', num_args = 3, value_names = ["START", "STOP", "STEP"], allow_negative_numbers = true)]
    pulse: Option<Vec<i64>>,

    /// Enable or disable power cycling of the target board by the glitcher [default: enabled]
    #[arg(long = "pwr-cycling", value_enum)]
    pwr_cycling: Option<PowerCycling>,

    /// Stop after this many full sweeps instead of running until Ctrl+C
    #[arg(long)]
    cycles: Option<u64>,

    /// Append timestamped glitcher output to this file
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Read settings from a TOML file (command-line flags take precedence)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            port: self.port.clone(),
            baudrate: self.baudrate,
            timeout: self.timeout,
            delay: sweep_arg(self.delay.as_deref(), "-d")?,
            pulse: sweep_arg(self.pulse.as_deref(), "-p")?,
            pwr_cycling: self.pwr_cycling,
            cycles: self.cycles,
            capture: self.capture.clone(),
        })
    }
}

fn sweep_arg(values: Option<&[i64]>, flag: &str) -> Result<Option<SweepRange>> {
    let Some(values) = values else {
        return Ok(None);
    };
    let triple: [i64; 3] = values
        .try_into()
        .map_err(|_| anyhow::anyhow!("{} takes exactly three values: START STOP STEP", flag))?;
    let range = SweepRange::try_from(triple).with_context(|| format!("Invalid {} range", flag))?;
    Ok(Some(range))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.list_ports {
        return serial::port::print_ports();
    }

    let mut settings = cli.settings()?;
    if let Some(ref path) = cli.config {
        settings = settings.layered_over(Settings::load(path)?);
    }
    let config = settings.resolve()?;

    let connection = match SerialConnection::open(config.port.clone()) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            eprintln!("Error: Could not open serial port. Aborting.");
            if let Ok(ports) = serial::port::list_ports() {
                let names: Vec<_> = ports.iter().map(|p| p.path.as_str()).collect();
                if !names.is_empty() {
                    eprintln!("Available ports: {}", names.join(", "));
                }
            }
            return Ok(());
        }
    };

    let read_timeout = connection.config().timeout;
    println!(
        "{} Connected to {} at {} baud",
        "[OK]".green().bold(),
        config.port.port_path.white().bold(),
        config.port.baud_rate
    );
    println!(
        "{} delay {} {} {}, pulse {} {} {}, power cycling {}",
        "[*]".cyan().bold(),
        config.plan.delay.start(),
        config.plan.delay.stop(),
        config.plan.delay.step(),
        config.plan.pulse.start(),
        config.plan.pulse.stop(),
        config.plan.pulse.step(),
        config.plan.power_cycling
    );
    println!(
        "{} {} pairs per sweep cycle",
        "[*]".cyan().bold(),
        glitch::sweep::pairs_per_cycle(&config.plan.delay, &config.plan.pulse)
    );

    let mut sink = OutputSink::stdout();
    if let Some(ref path) = config.capture {
        sink = sink.with_capture(path)?;
        println!("{} Capturing to: {}", "[LOG]".cyan().bold(), path.display().to_string().white());
    }

    let channel = serial::shared(connection);
    let listener = Listener::start(channel.clone(), sink)?;
    let interrupt = signal::interrupt_on_ctrl_c()?;

    let mut controller = SweepController::new(channel, config.plan, interrupt);
    match controller.run() {
        Ok(SweepExit::Interrupted) => {}
        Ok(SweepExit::CyclesCompleted(n)) => {
            println!("{} Completed {} sweep cycle(s)", "[OK]".green().bold(), n);
        }
        Ok(SweepExit::TargetCompromised { delay, pulse }) => {
            println!(
                "{} SUCCESS at delay={}, pulse={}",
                "[OK]".green().bold(),
                delay,
                pulse
            );
        }
        Err(e) => {
            eprintln!("{} Sweep aborted: {}", "[ERROR]".red().bold(), e);
        }
    }

    if let Some(stats) = listener.stop(read_timeout) {
        log::info!(
            "Received {} bytes from the glitcher ({} chunks shown, {} dropped)",
            stats.bytes_received,
            stats.chunks_emitted,
            stats.chunks_dropped
        );
    }
    println!("\nGood bye.");
    Ok(())
}
