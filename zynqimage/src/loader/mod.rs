//! Input file loaders
//!
//! The format of a component file is detected from its first little-endian
//! word. Every format produces a [`Payload`]: the bytes to be placed in the
//! image plus what the partition header needs to know about them.

pub mod bitstream;
pub mod elf;
pub mod uimage;

use crate::error::{BootImageError, Result};
use log::debug;
use std::path::Path;

pub use bitstream::{Bitstream, load_bitstream};
pub use elf::{ElfClass, ElfImage, load_elf};
pub use uimage::{OsImageType, os_image_type};

/// First word of an ELF file
pub const MAGIC_ELF: u32 = 0x464C_457F;
/// First word of a Xilinx bitstream
pub const MAGIC_BITSTREAM: u32 = 0xF00F_0900;
/// First word of a U-Boot legacy image
pub const MAGIC_UIMAGE: u32 = 0x5619_0527;
/// First word of a flattened device tree
pub const MAGIC_DTB: u32 = 0xEDFE_0DD0;

/// Detected input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Elf,
    Bitstream,
    OsImage,
    DeviceTree,
    Raw,
}

impl FileFormat {
    /// Detect the format from the leading bytes of a file
    pub fn detect(data: &[u8]) -> Self {
        let Some(head) = data.first_chunk::<4>() else {
            return Self::Raw;
        };
        match u32::from_le_bytes(*head) {
            MAGIC_ELF => Self::Elf,
            MAGIC_BITSTREAM => Self::Bitstream,
            MAGIC_UIMAGE => Self::OsImage,
            MAGIC_DTB => Self::DeviceTree,
            _ => Self::Raw,
        }
    }
}

/// What the partition header builders need to know about a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Raw,
    DeviceTree,
    Elf {
        load: u64,
        entry: u64,
        class: ElfClass,
    },
    /// FPGA configuration data, `length` as stated by the file
    Bitstream { length: u32 },
    OsImage { image_type: OsImageType },
}

/// Bytes to be placed in the image
#[derive(Debug, Clone)]
pub struct Payload {
    pub kind: PayloadKind,
    pub data: Vec<u8>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this payload is a U-Boot kernel image
    pub fn is_os_kernel(&self) -> bool {
        matches!(
            self.kind,
            PayloadKind::OsImage {
                image_type: OsImageType::Kernel
            }
        )
    }
}

/// Size of an input file, which must be a regular file
pub fn input_size(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|source| BootImageError::InputFile {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(BootImageError::NotRegularFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}

/// Read a whole input file
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    input_size(path)?;
    std::fs::read(path).map_err(|source| BootImageError::InputFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a component file and turn it into a payload
///
/// An ELF file may span at most `elf_max` bytes once loaded.
pub fn load_payload(path: &Path, elf_max: u64) -> Result<Payload> {
    let data = read_input(path)?;
    let format = FileFormat::detect(&data);
    debug!("{}: {:?}, {} bytes", path.display(), format, data.len());
    payload_from_bytes(data, format, elf_max)
}

/// Turn file contents of a known format into a payload
pub fn payload_from_bytes(data: Vec<u8>, format: FileFormat, elf_max: u64) -> Result<Payload> {
    let payload = match format {
        FileFormat::Elf => {
            let image = load_elf(&data, elf_max)?;
            Payload {
                kind: PayloadKind::Elf {
                    load: image.load,
                    entry: image.entry,
                    class: image.class,
                },
                data: image.data,
            }
        }
        FileFormat::Bitstream => {
            let bitstream = load_bitstream(&data)?;
            Payload {
                kind: PayloadKind::Bitstream {
                    length: bitstream.length,
                },
                data: bitstream.data,
            }
        }
        FileFormat::OsImage => {
            let image_type = os_image_type(&data)?;
            Payload {
                kind: PayloadKind::OsImage { image_type },
                data,
            }
        }
        FileFormat::DeviceTree => Payload {
            kind: PayloadKind::DeviceTree,
            data,
        },
        FileFormat::Raw => Payload {
            kind: PayloadKind::Raw,
            data,
        },
    };
    Ok(payload)
}
