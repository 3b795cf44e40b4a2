//! U-Boot legacy image header

use crate::error::{BootImageError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Magic number of U-Boot legacy images, as stored big-endian
pub const IH_MAGIC: u32 = 0x2705_1956;

/// Size of the legacy image header
pub const IH_HEADER_SIZE: usize = 64;

/// Image types the partition header builders tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsImageType {
    /// OS kernel image
    Kernel,
    /// RAM disk image
    Ramdisk,
    /// Script file
    Script,
    /// Any other image type, with its raw value
    Other(u8),
}

impl From<u8> for OsImageType {
    fn from(value: u8) -> Self {
        match value {
            2 => Self::Kernel,
            3 => Self::Ramdisk,
            6 => Self::Script,
            other => Self::Other(other),
        }
    }
}

/// Offset of the image type byte within the header
const IH_TYPE_OFFSET: usize = 30;

/// Read the image type of the U-Boot legacy image at the start of `data`
///
/// Only the magic and the type byte are looked at; the header and data
/// CRCs are left to U-Boot.
pub fn os_image_type(data: &[u8]) -> Result<OsImageType> {
    if data.len() < IH_HEADER_SIZE {
        return Err(BootImageError::os_image(format!(
            "header data too short: {} bytes (expected at least {})",
            data.len(),
            IH_HEADER_SIZE
        )));
    }

    let magic = BigEndian::read_u32(&data[0..4]);
    if magic != IH_MAGIC {
        return Err(BootImageError::os_image(format!(
            "bad magic {magic:#010x}"
        )));
    }
    Ok(OsImageType::from(data[IH_TYPE_OFFSET]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(image_type: u8, name: &str) -> Vec<u8> {
        let mut data = Vec::with_capacity(IH_HEADER_SIZE);
        for word in [IH_MAGIC, 0xDEAD_BEEF, 0, 0x100, 0x8000, 0x8040, 0] {
            data.extend_from_slice(&word.to_be_bytes());
        }
        data.extend_from_slice(&[5, 2, image_type, 0]);
        let mut name_bytes = [0u8; 32];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&name_bytes);
        data
    }

    #[test]
    fn test_parse_kernel_header() {
        assert_eq!(os_image_type(&header(2, "Linux")).unwrap(), OsImageType::Kernel);
        assert_eq!(os_image_type(&header(3, "initrd")).unwrap(), OsImageType::Ramdisk);
    }

    #[test]
    fn test_image_types() {
        assert_eq!(OsImageType::from(3), OsImageType::Ramdisk);
        assert_eq!(OsImageType::from(6), OsImageType::Script);
        assert_eq!(OsImageType::from(8), OsImageType::Other(8));
    }

    #[test]
    fn test_short_header() {
        let err = os_image_type(&header(2, "x")[..40]).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = header(2, "x");
        data[0] = 0;
        assert!(matches!(
            os_image_type(&data),
            Err(BootImageError::OsImage(_))
        ));
    }
}
