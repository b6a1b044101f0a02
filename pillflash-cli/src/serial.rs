//! Interactive serial port selection.
//!
//! Resolution order: explicit `--port`/env, configured port, then
//! enumeration. A single candidate is auto-selected, several prompt via
//! `dialoguer`, and non-interactive mode fails deterministically instead
//! of prompting.

use std::io::IsTerminal;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use log::debug;
use pillflash::{NativePortEnumerator, PortEnumerator, PortInfo};

use crate::{CliError, config::Config};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail if multiple ports).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    // Selection failures are usage/setup issues and map to exit code 2,
    // which CI/script callers branch on.
    CliError::Usage(message.to_string()).into()
}

/// Select a serial port interactively or automatically.
pub fn select_serial_port(options: &SerialOptions, config: &mut Config) -> Result<String> {
    // If port explicitly specified, use it
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    // If port in config, use it
    if let Some(port_name) = &config.connection.serial {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    // Detect available ports
    let ports = NativePortEnumerator::list_ports()?;

    match ports.len() {
        0 => Err(usage_err(
            "No serial ports found. Connect the device or pass --port.",
        )),
        1 => {
            let name = ports[0].name.clone();
            eprintln!(
                "{} Using the only available port: {}",
                style("→").green(),
                style(&name).cyan()
            );
            Ok(name)
        },
        _ if options.non_interactive => Err(usage_err(
            "Multiple serial ports found; pass --port in non-interactive mode.",
        )),
        _ => select_port_interactive(&ports, config),
    }
}

fn select_port_interactive(ports: &[PortInfo], config: &mut Config) -> Result<String> {
    if !std::io::stderr().is_terminal() {
        return Err(usage_err(
            "Multiple serial ports found and no terminal to prompt on; pass --port.",
        ));
    }

    let labels: Vec<String> = ports.iter().map(format_port).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| usage_err(&format!("Port selection cancelled: {e}")))?;

    let name = ports[selection].name.clone();

    let remember = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Remember {name} in pillflash.toml?"))
        .default(false)
        .interact()
        .unwrap_or(false);
    if remember {
        config.save_port(&name)?;
    }

    Ok(name)
}

fn format_port(port: &PortInfo) -> String {
    let mut label = port.name.clone();
    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        label.push_str(&format!(" ({vid:04X}:{pid:04X})"));
    }
    if let Some(product) = &port.product {
        label.push_str(&format!(" - {product}"));
    }
    label
}
