//! # pillflash
//!
//! A library for flashing firmware to devices running the pill serial
//! bootloader.
//!
//! This crate provides the core functionality for talking to the
//! bootloader over a serial port:
//!
//! - Fixed 18-byte packet framing with CRC-8 error detection
//! - A reliable delivery layer (ack / retransmit-request)
//! - The synchronization + handshake + chunked-transfer state machine
//! - Firmware image loading and 0xFF padding
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//!
//! ## Example
//!
//! ```rust,no_run
//! use pillflash::{FirmwareImage, NativePort, PacketLink, Port, Updater};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = FirmwareImage::from_file("firmware.bin")?;
//!
//!     let mut port = NativePort::open("/dev/ttyUSB0", 115200)?;
//!     let reader = port.try_clone_reader()?;
//!     let link = PacketLink::new(reader, port);
//!
//!     let mut updater = Updater::new(link, image.as_bytes())?;
//!     updater.run(&mut |sent, total| {
//!         println!("Sent {sent}/{total} bytes");
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod error;
pub mod image;
pub mod link;
pub mod port;
pub mod protocol;
pub mod updater;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupt_requested() -> bool {
    INTERRUPT_CHECKER.get().is_some_and(|checker| checker())
}

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    error::{Error, Result},
    image::{BOOTLOADER_SIZE, FirmwareImage, pad_to},
    link::{DEFAULT_TIMEOUT, PacketLink},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{DEVICE_ID, Opcode, PACKET_LEN, PAYLOAD_LEN, Packet, PacketFramer, SYNC_SEQ},
    updater::{UpdateState, Updater},
};
