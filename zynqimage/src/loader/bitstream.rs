//! Xilinx `.bit` bitstream files

use crate::error::{BootImageError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::NaiveDateTime;

/// Second word of the bitstream magic
pub const MAGIC_BITSTREAM_1: u32 = 0xF00F_F00F;

/// Offset of the first header section
pub const SECTIONS_START: usize = 13;

/// Tag of the section carrying the configuration data
pub const DATA_SECTION: u8 = b'e';

/// File prefix up to the first header section
const FILE_PREFIX: [u8; SECTIONS_START] = [
    0x00, 0x09, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x0f, 0xf0, 0x00, 0x00, 0x01,
];

/// Longest header section value, terminating NUL included
const MAX_SECTION_LEN: usize = 0xFF;

/// Configuration data extracted from a bitstream file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    /// Data length as stated in the file
    pub length: u32,
    /// Data rounded up to whole words, each word byte-swapped
    pub data: Vec<u8>,
}

/// Whether `data` starts with the two word bitstream magic
pub fn is_bitstream(data: &[u8]) -> bool {
    data.len() >= 8
        && LittleEndian::read_u32(&data[0..4]) == super::MAGIC_BITSTREAM
        && LittleEndian::read_u32(&data[4..8]) == MAGIC_BITSTREAM_1
}

fn truncated() -> BootImageError {
    BootImageError::bitstream("file is truncated")
}

/// Extract the configuration data of a bitstream file
///
/// Header sections are a tag byte, a byte that must be 0 or 1, a length
/// byte and the value. The data section stores a big-endian 32 bit length
/// right after its tag, so the same 0 or 1 check covers its top byte.
pub fn load_bitstream(data: &[u8]) -> Result<Bitstream> {
    if !is_bitstream(data) {
        return Err(BootImageError::bitstream("bad magic"));
    }

    let mut pos = SECTIONS_START;
    let start = loop {
        let section = data.get(pos..pos + 3).ok_or_else(truncated)?;
        if section[1] > 1 {
            return Err(BootImageError::bitstream(format!(
                "mismatched section at {pos:#x}"
            )));
        }
        if section[0] == DATA_SECTION {
            break pos + 1;
        }
        pos += 3 + section[2] as usize;
    };

    let length = BigEndian::read_u32(data.get(start..start + 4).ok_or_else(truncated)?);
    let padded = (length as usize).div_ceil(4) * 4;
    let body = data
        .get(start + 4..start + 4 + padded)
        .ok_or_else(truncated)?;

    Ok(Bitstream {
        length,
        data: swap_words(body),
    })
}

/// Reverse the byte order of every whole word of `data`
pub fn swap_words(data: &[u8]) -> Vec<u8> {
    let mut swapped = Vec::with_capacity(data.len());
    for word in data.chunks_exact(4) {
        swapped.extend(word.iter().rev());
    }
    swapped
}

fn push_section(file: &mut Vec<u8>, tag: u8, value: &str) -> Result<()> {
    let len = value.len() + 1;
    if value.contains('\0') || len > MAX_SECTION_LEN {
        return Err(BootImageError::bitstream(format!(
            "section '{}' value {value:?} does not fit in a header section",
            tag as char
        )));
    }
    file.push(tag);
    file.extend_from_slice(&(len as u16).to_be_bytes());
    file.extend_from_slice(value.as_bytes());
    file.push(0);
    Ok(())
}

/// Build the header of a bitstream file holding `length` bytes of data
///
/// Sections `a` to `d` carry the design name, the part name and the date
/// and time of `timestamp`, followed by the start of the data section.
/// The configuration data itself goes right after, in file byte order.
pub fn write_header(
    design: &str,
    part: &str,
    timestamp: NaiveDateTime,
    length: u32,
) -> Result<Vec<u8>> {
    let mut file = FILE_PREFIX.to_vec();
    push_section(&mut file, b'a', design)?;
    push_section(&mut file, b'b', part)?;
    push_section(&mut file, b'c', &timestamp.format("%Y/%m/%d").to_string())?;
    push_section(&mut file, b'd', &timestamp.format("%H:%M:%S").to_string())?;
    file.push(DATA_SECTION);
    file.extend_from_slice(&length.to_be_bytes());
    Ok(file)
}
