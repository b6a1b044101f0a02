//! Firmware image loading and padding.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// Flash bytes reserved for the bootloader itself.
///
/// The application image starts at this offset, and a bootloader binary
/// must be padded to exactly this size before it is written to flash.
pub const BOOTLOADER_SIZE: usize = 0x6000;

/// Byte used to pad images (erased-flash value).
pub const IMAGE_PAD_BYTE: u8 = 0xFF;

/// A firmware image loaded into memory.
///
/// The update protocol transmits the image length in a 4-byte field, so an
/// image must be non-empty and fit in `u32`.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Wrap an already-loaded byte sequence.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidImage("image is empty".into()));
        }
        if u32::try_from(data.len()).is_err() {
            return Err(Error::InvalidImage(format!(
                "image is {} bytes, length field is 32-bit",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// Load an image from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!("Loaded {} bytes from {}", data.len(), path.display());
        Self::new(data)
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty (never true for a constructed image).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Pad `data` with [`IMAGE_PAD_BYTE`] up to `target` bytes.
///
/// Fails if the input is already larger than the target. Used to grow a
/// bootloader binary to [`BOOTLOADER_SIZE`] so the application lands at
/// its fixed flash offset.
pub fn pad_to(data: &mut Vec<u8>, target: usize) -> Result<()> {
    if data.len() > target {
        return Err(Error::InvalidImage(format!(
            "image is {} bytes, larger than the {target}-byte target",
            data.len()
        )));
    }
    data.resize(target, IMAGE_PAD_BYTE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_rejects_empty() {
        assert!(matches!(
            FirmwareImage::new(Vec::new()),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn test_image_reports_length() {
        let image = FirmwareImage::new(vec![0x00; 33]).unwrap();
        assert_eq!(image.len(), 33);
        assert!(!image.is_empty());
        assert_eq!(image.as_bytes().len(), 33);
    }

    #[test]
    fn test_pad_to_grows_with_erased_flash_value() {
        let mut data = vec![0x01, 0x02, 0x03];
        pad_to(&mut data, 8).unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_pad_to_exact_size_is_noop() {
        let mut data = vec![0xAA; 16];
        pad_to(&mut data, 16).unwrap();
        assert_eq!(data, vec![0xAA; 16]);
    }

    #[test]
    fn test_pad_to_rejects_oversized_input() {
        let mut data = vec![0u8; BOOTLOADER_SIZE + 1];
        assert!(matches!(
            pad_to(&mut data, BOOTLOADER_SIZE),
            Err(Error::InvalidImage(_))
        ));
    }
}
