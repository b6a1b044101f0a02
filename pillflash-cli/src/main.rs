//! pillflash CLI - Command-line tool for flashing firmware through the
//! pill serial bootloader.
//!
//! ## Features
//!
//! - Flash a firmware image over the bootloader's packet protocol
//! - Pad a bootloader binary to its reserved flash size
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable support

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Whether Ctrl-C was received.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user asked to stop (Ctrl-C).
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

mod commands;
mod config;
mod serial;

use commands::{cmd_completions, cmd_pad, cmd_update};
use config::Config;
use serial::{SerialOptions, select_serial_port};

/// Baud rate used when neither the CLI nor the config names one.
const DEFAULT_BAUD: u32 = 115200;

/// CLI-level failures that map to dedicated exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or unusable environment (exit code 2).
    #[error("{0}")]
    Usage(String),

    /// Interrupted by the user (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

/// pillflash - flash firmware to devices running the pill serial bootloader.
///
/// Environment variables:
///   PILLFLASH_PORT              - Default serial port
///   PILLFLASH_BAUD              - Default baud rate (default: 115200)
///   PILLFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "pillflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "PILLFLASH_PORT")]
    port: Option<String>,

    /// Baud rate for the bootloader link.
    #[arg(short, long, global = true, env = "PILLFLASH_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "PILLFLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash a firmware image through the bootloader.
    Update {
        /// Path to the firmware binary.
        firmware: PathBuf,
    },

    /// Pad a bootloader binary with 0xFF up to its reserved flash size.
    Pad {
        /// Path to the binary to pad.
        file: PathBuf,

        /// Target size in bytes (defaults to the bootloader flash region).
        #[arg(long, value_parser = parse_size, default_value = "0x6000")]
        size: usize,

        /// Write the padded image here instead of in place.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a size argument in decimal or hex (supports 0x prefix and
/// underscores).
fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let cleaned: String = s.chars().filter(|c| *c != '_').collect();
    let parsed = if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16)
    } else {
        cleaned.parse()
    };
    parsed.map_err(|e| format!("Invalid size: {e}"))
}

fn main() {
    match run() {
        Ok(()) => {},
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            let code = match err.downcast_ref::<CliError>() {
                Some(CliError::Usage(_)) => 2,
                Some(CliError::Cancelled(_)) => 130,
                None => 1,
            };
            std::process::exit(code);
        },
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "pillflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Forward Ctrl-C to the library's long-running loops.
    let _ = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed));
    pillflash::set_interrupt_checker(|| INTERRUPTED.load(Ordering::Relaxed));

    // Load configuration
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Update { firmware } => {
            cmd_update(&cli, &mut config, firmware)?;
        },
        Commands::Pad { file, size, output } => {
            cmd_pad(&cli, file, *size, output.as_deref())?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json)?;
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}

/// Resolve the serial port from CLI args, config, or interactive selection.
fn get_port(cli: &Cli, config: &mut Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options, config)
}

/// Resolve the baud rate from CLI args, config, or the default.
fn get_baud(cli: &Cli, config: &Config) -> u32 {
    cli.baud
        .or(config.connection.baud)
        .unwrap_or(DEFAULT_BAUD)
}

/// List ports command implementation.
fn cmd_list_ports(json: bool) -> Result<()> {
    use pillflash::{NativePortEnumerator, PortEnumerator};

    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;

    if json {
        let entries: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("no ports found").dim());
    } else {
        for port in &ports {
            let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" ({vid:04X}:{pid:04X})")
            } else {
                String::new()
            };
            let product = port
                .product
                .as_deref()
                .map(|p| format!(" - {}", style(p).dim()))
                .unwrap_or_default();

            eprintln!(
                "  {} {}{}{}",
                style("•").green(),
                style(&port.name).cyan(),
                vid_pid,
                product
            );
        }
    }

    Ok(())
}
