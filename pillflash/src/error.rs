//! Error types for pillflash.

use std::io;
use thiserror::Error;

/// Result type for pillflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pillflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Packet payload exceeds the 16-byte limit.
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Offending payload length.
        len: usize,
        /// Maximum payload length.
        max: usize,
    },

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Receive queue closed because the reader side of the link is gone.
    #[error("Link closed: transport reader stopped")]
    LinkClosed,

    /// The device answered with something other than the packet the current
    /// transfer step requires.
    #[error("Unexpected response during {during}")]
    UnexpectedPacket {
        /// Transfer step that received the packet.
        during: &'static str,
    },

    /// The bootloader reported that it aborted the update on its side.
    #[error("Device aborted the update")]
    DeviceFailure,

    /// Invalid firmware image.
    #[error("Invalid firmware image: {0}")]
    InvalidImage(String),

    /// Operation interrupted by the embedding application (e.g. Ctrl-C).
    #[error("Interrupted")]
    Interrupted,
}
