//! Firmware update command implementation.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pillflash::{FirmwareImage, NativePort, PacketLink, Port as _, Updater};
use std::path::Path;

use crate::config::Config;
use crate::{Cli, CliError, get_baud, get_port, use_fancy_output, was_interrupted};

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".to_string()).into())
    } else {
        Ok(())
    }
}

/// Update command implementation.
pub(crate) fn cmd_update(cli: &Cli, config: &mut Config, firmware: &Path) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware image {}",
            style("📦").cyan(),
            firmware.display()
        );
    }

    let image = FirmwareImage::from_file(firmware)
        .with_context(|| format!("Failed to load firmware image {}", firmware.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} Image is {} bytes",
            style("ℹ").blue(),
            image.len()
        );
    }

    // Get port
    let port_name = get_port(cli, config)?;
    let baud = get_baud(cli, config);
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            port_name,
            baud
        );
    }

    let port = NativePort::open(&port_name, baud)
        .with_context(|| format!("Failed to open {port_name}"))?;
    let reader = port.try_clone_reader()?;
    let link = PacketLink::new(reader, port);

    ensure_not_interrupted()?;

    if !cli.quiet {
        eprintln!(
            "{} Reset the device to enter the bootloader...",
            style("⏳").yellow()
        );
    }

    // Create progress bar
    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(image.len() as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    };
    pb.set_message("flashing");

    let mut updater = Updater::new(link, image.as_bytes())?;
    let result = updater.run(&mut |sent, _total| {
        pb.set_position(sent as u64);
    });

    match result {
        Ok(()) => {
            pb.finish_with_message("complete");
            if !cli.quiet {
                eprintln!(
                    "\n{} Firmware update completed",
                    style("🎉").green().bold()
                );
            }
            Ok(())
        },
        Err(err) => {
            pb.abandon_with_message("failed");
            if was_interrupted() {
                return Err(CliError::Cancelled("Interrupted".to_string()).into());
            }
            Err(err).context("Firmware update failed")
        },
    }
}
