//! ELF loader
//!
//! Flattens the allocated sections of an ELF file into one contiguous
//! memory image, the way the file would look after being loaded.

use crate::error::{BootImageError, Result};
use log::debug;
use object::elf::{FileHeader32, FileHeader64, SHF_ALLOC, SHT_NOBITS};
use object::read::elf::{FileHeader, SectionHeader};
use object::{Endianness, FileKind};

/// Word size of an ELF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    pub fn bits(self) -> u32 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 64,
        }
    }
}

/// Memory image of the loadable part of an ELF file
#[derive(Debug, Clone)]
pub struct ElfImage {
    /// Lowest address of any loadable section
    pub load: u64,
    /// Entry point
    pub entry: u64,
    pub class: ElfClass,
    /// Bytes from `load` to the end of the highest section, gaps zeroed
    pub data: Vec<u8>,
}

/// Load an ELF file whose loadable range may span at most `max_size` bytes
pub fn load_elf(data: &[u8], max_size: u64) -> Result<ElfImage> {
    match FileKind::parse(data)? {
        FileKind::Elf32 => load_sections::<FileHeader32<Endianness>>(data, ElfClass::Elf32, max_size),
        FileKind::Elf64 => load_sections::<FileHeader64<Endianness>>(data, ElfClass::Elf64, max_size),
        kind => Err(BootImageError::UnsupportedElf(format!("{kind:?}"))),
    }
}

fn load_sections<Elf>(data: &[u8], class: ElfClass, max_size: u64) -> Result<ElfImage>
where
    Elf: FileHeader<Endian = Endianness>,
{
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    let sections = header.sections(endian, data)?;

    let mut loadable = Vec::new();
    for section in sections.iter() {
        let flags: u64 = section.sh_flags(endian).into();
        let size: u64 = section.sh_size(endian).into();
        if section.sh_type(endian) == SHT_NOBITS || flags & u64::from(SHF_ALLOC) == 0 || size == 0 {
            continue;
        }
        let addr: u64 = section.sh_addr(endian).into();
        loadable.push((addr, section.data(endian, data)?));
    }

    let start = loadable
        .iter()
        .map(|(addr, _)| *addr)
        .min()
        .ok_or(BootImageError::NoLoadableSections)?;
    let end = loadable
        .iter()
        .map(|(addr, bytes)| addr.saturating_add(bytes.len() as u64))
        .max()
        .unwrap_or(start);

    let size = end - start;
    if size > max_size {
        return Err(BootImageError::ElfTooLarge {
            size,
            max: max_size,
        });
    }

    let mut image = Vec::new();
    image
        .try_reserve_exact(size as usize)
        .map_err(|source| BootImageError::Allocation {
            size: size as usize,
            source,
        })?;
    image.resize(size as usize, 0);

    for (addr, bytes) in loadable {
        let offset = (addr - start) as usize;
        image[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    let entry: u64 = header.e_entry(endian).into();
    debug!(
        "ELF{}: load {start:#x}, entry {entry:#x}, {size:#x} bytes",
        class.bits()
    );

    Ok(ElfImage {
        load: start,
        entry,
        class,
        data: image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            load_elf(b"\x7fELF\x09garbage", u64::MAX),
            Err(BootImageError::Elf(_))
        ));
    }

    #[test]
    fn test_class_bits() {
        assert_eq!(ElfClass::Elf32.bits(), 32);
        assert_eq!(ElfClass::Elf64.bits(), 64);
    }
}
