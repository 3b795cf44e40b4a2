//! Image headers and the image header table

use crate::checksum::checksum;
use crate::error::{BootImageError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Size of an image header and of the image header table in words
pub const IMAGE_HEADER_WORDS: usize = 16;

/// Bytes reserved for the packed partition name
pub const NAME_LEN: usize = 32;

/// Image header table format version
pub const IMAGE_TABLE_VERSION: u32 = 0x0102_0000;

/// Boot device field: boot from the same device as the boot header
pub const BOOT_DEVICE_SAME: u32 = 0x0;

/// Pack a partition name the way the boot ROM expects it
///
/// The name is zero padded to whole words and the bytes of each word are
/// reversed. One zero word terminates the name, two if the name already ends
/// on a word boundary. Unused bytes are `0xFF`.
pub fn pack_name(name: &str) -> [u8; NAME_LEN] {
    let raw = name.as_bytes();
    let mut packed = Vec::with_capacity(raw.len() + 12);

    for chunk in raw.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        word.reverse();
        packed.extend_from_slice(&word);
    }

    let terminators = if raw.len() % 4 == 0 { 2 } else { 1 };
    packed.extend(std::iter::repeat_n(0u8, terminators * 4));

    let mut out = [0xFFu8; NAME_LEN];
    let len = packed.len().min(NAME_LEN);
    out[..len].copy_from_slice(&packed[..len]);
    out
}

/// Recover a name packed by [`pack_name`]
pub fn unpack_name(packed: &[u8]) -> String {
    let mut name = Vec::with_capacity(packed.len());
    for chunk in packed.chunks_exact(4) {
        if chunk == [0, 0, 0, 0] {
            break;
        }
        name.extend(chunk.iter().rev().filter(|&&b| b != 0 && b < 0x80));
    }
    String::from_utf8_lossy(&name).into_owned()
}

fn expect_words(words: &[u32], what: &str) -> Result<()> {
    if words.len() < IMAGE_HEADER_WORDS {
        return Err(BootImageError::invalid_image(format!(
            "{what} truncated: {} words",
            words.len()
        )));
    }
    Ok(())
}

/// One image header of the chain, one per partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Word offset of the next image header, 0 for the last one
    pub next_img_off: u32,
    /// Word offset of this image's partition header
    pub part_hdr_off: u32,
    pub part_count: u32,
    /// Name length field, always 1 in generated images
    pub name_len: u32,
    pub name: [u8; NAME_LEN],
}

impl ImageHeader {
    /// Image header carrying the packed `name`
    pub fn new(name: &str) -> Self {
        Self {
            next_img_off: 0,
            part_hdr_off: 0,
            part_count: 0,
            name_len: 1,
            name: pack_name(name),
        }
    }

    /// The stored name, unpacked
    pub fn name(&self) -> String {
        unpack_name(&self.name)
    }

    pub fn to_words(&self) -> [u32; IMAGE_HEADER_WORDS] {
        let mut words = [0xFFFF_FFFFu32; IMAGE_HEADER_WORDS];
        words[0] = self.next_img_off;
        words[1] = self.part_hdr_off;
        words[2] = self.part_count;
        words[3] = self.name_len;
        LittleEndian::read_u32_into(&self.name, &mut words[4..4 + NAME_LEN / 4]);
        words
    }

    pub fn from_words(words: &[u32]) -> Result<Self> {
        expect_words(words, "image header")?;
        let mut name = [0u8; NAME_LEN];
        LittleEndian::write_u32_into(&words[4..4 + NAME_LEN / 4], &mut name);
        Ok(Self {
            next_img_off: words[0],
            part_hdr_off: words[1],
            part_count: words[2],
            name_len: words[3],
            name,
        })
    }
}

/// Target specific end of the image header table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableTail {
    /// Zynq: the rest of the table is `0xFFFFFFFF`
    Padding,
    /// ZynqMP: boot device, reserved words and a checksum
    BootDevice { boot_device: u32, checksum: u32 },
}

/// Image header table, the root of the image header chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeaderTable {
    pub version: u32,
    /// Number of image headers
    pub hdrs_count: u32,
    /// Word offset of the partition header table
    pub part_hdr_off: u32,
    /// Word offset of the first image header
    pub part_img_hdr_off: u32,
    pub auth_hdr_off: u32,
    pub tail: TableTail,
}

impl ImageHeaderTable {
    /// Empty table with the given tail
    pub fn new(tail: TableTail) -> Self {
        Self {
            version: IMAGE_TABLE_VERSION,
            hdrs_count: 0,
            part_hdr_off: 0,
            part_img_hdr_off: 0,
            auth_hdr_off: 0,
            tail,
        }
    }

    pub fn to_words(&self) -> [u32; IMAGE_HEADER_WORDS] {
        let mut words = [0u32; IMAGE_HEADER_WORDS];
        words[0] = self.version;
        words[1] = self.hdrs_count;
        words[2] = self.part_hdr_off;
        words[3] = self.part_img_hdr_off;
        words[4] = self.auth_hdr_off;
        match self.tail {
            TableTail::Padding => words[5..].fill(0xFFFF_FFFF),
            TableTail::BootDevice {
                boot_device,
                checksum,
            } => {
                words[5] = boot_device;
                words[15] = checksum;
            }
        }
        words
    }

    /// Decode a table; `checksummed` selects the ZynqMP tail
    pub fn from_words(words: &[u32], checksummed: bool) -> Result<Self> {
        expect_words(words, "image header table")?;
        let tail = if checksummed {
            TableTail::BootDevice {
                boot_device: words[5],
                checksum: words[15],
            }
        } else {
            TableTail::Padding
        };
        Ok(Self {
            version: words[0],
            hdrs_count: words[1],
            part_hdr_off: words[2],
            part_img_hdr_off: words[3],
            auth_hdr_off: words[4],
            tail,
        })
    }

    /// Recompute the checksum; no-op for a padded tail
    pub fn update_checksum(&mut self) {
        let sum = checksum(&self.to_words()[..15]);
        if let TableTail::BootDevice { checksum, .. } = &mut self.tail {
            *checksum = sum;
        }
    }

    /// Whether the stored checksum matches, always true for a padded tail
    pub fn checksum_valid(&self) -> bool {
        match self.tail {
            TableTail::Padding => true,
            TableTail::BootDevice { checksum: sum, .. } => checksum(&self.to_words()[..15]) == sum,
        }
    }
}
