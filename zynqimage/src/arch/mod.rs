//! Target architectures
//!
//! Both supported chip families share the overall boot image structure but
//! disagree on header shapes, region offsets and a number of attribute rules.
//! Each family implements [`Architecture`]; the assembler in
//! [`crate::builder`] is generic over it and [`Target`] picks one per build.

pub mod zynq;
pub mod zynqmp;

pub use zynq::Zynq;
pub use zynqmp::ZynqMp;

use crate::arena::ImageArena;
use crate::component::Component;
use crate::error::{BootImageError, Result};
use crate::headers::{
    BootHeaderFormat, IMAGE_HEADER_WORDS, ImageHeader, ImageHeaderTable, PARTITION_HEADER_WORDS,
    PartitionHeaderFormat, TableTail,
};
use crate::layout::{FILL_ERASED, Layout};
use crate::loader::{ElfClass, OsImageType, Payload, PayloadKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Padding granularity of partition payloads in words
pub const PAYLOAD_ALIGN_WORDS: usize = 16;

/// Target-specific parts of boot image assembly
pub trait Architecture {
    /// Name used in logs and messages
    const NAME: &'static str;

    /// Terminate the partition header table with an all-zero header
    const APPEND_NULL_PARTITION: bool;

    /// PMU firmware can be folded into the bootloader partition
    const SUPPORTS_PMUFW: bool;

    /// The image header table ends with a checksum
    const TABLE_CHECKSUMMED: bool;

    /// Word appended after a PL bitstream and counted in its lengths
    const BITSTREAM_TRAILER: Option<[u8; 4]>;

    type BootHeader: BootHeaderFormat + Clone + fmt::Debug;
    type PartitionHeader: PartitionHeaderFormat + Clone + fmt::Debug + Default;

    /// Region offsets for `partition_count` partitions
    fn init_layout(arena: ImageArena, partition_count: usize) -> Layout;

    /// Boot header with defaults and the layout's table offsets
    fn init_header(layout: &Layout) -> Self::BootHeader;

    /// Point the boot header at a bootloader of `len` bytes placed at the
    /// content cursor
    fn setup_bootloader(header: &mut Self::BootHeader, layout: &Layout, len: u32);

    /// Record a PMU firmware image of `len` bytes
    fn setup_pmufw(header: &mut Self::BootHeader, len: u32) {
        let _ = (header, len);
    }

    /// Write the image header chain and return the table describing it
    ///
    /// Links every partition header to its image header and finalizes the
    /// partition header checksums.
    fn build_image_header_table(
        layout: &mut Layout,
        images: &mut [ImageHeader],
        partitions: &mut [Self::PartitionHeader],
    ) -> Result<ImageHeaderTable>;

    /// Partition header of a raw binary
    fn default_partition(component: &Component) -> Self::PartitionHeader;

    /// Partition header of a device tree blob
    fn device_tree_partition(component: &Component) -> Self::PartitionHeader;

    /// Partition header of an ELF image of `size` bytes, prefix included
    fn elf_partition(
        component: &Component,
        size: usize,
        load: u64,
        entry: u64,
        class: ElfClass,
    ) -> Self::PartitionHeader;

    /// Partition header of an FPGA bitstream
    fn bitstream_partition(component: &Component) -> Self::PartitionHeader;

    /// Partition header of a U-Boot legacy image
    fn os_image_partition(component: &Component, image_type: OsImageType) -> Self::PartitionHeader;

    /// Finalize a partition header once `words` payload words are written at
    /// the content cursor, returning the padded length in words
    fn finish_partition_header(
        header: &mut Self::PartitionHeader,
        layout: &mut Layout,
        words: usize,
    ) -> Result<usize>;

    /// Decode a boot header read from an image
    fn decode_boot_header(words: &[u32]) -> Result<Self::BootHeader>;

    /// Pick the partition header builder for a payload
    fn make_partition_header(
        component: &Component,
        payload: &Payload,
        prefix_len: usize,
    ) -> Self::PartitionHeader {
        match payload.kind {
            PayloadKind::Raw => Self::default_partition(component),
            PayloadKind::DeviceTree => Self::device_tree_partition(component),
            PayloadKind::Elf { load, entry, class } => {
                Self::elf_partition(component, payload.len() + prefix_len, load, entry, class)
            }
            PayloadKind::Bitstream { .. } => Self::bitstream_partition(component),
            PayloadKind::OsImage { image_type } => Self::os_image_partition(component, image_type),
        }
    }

    /// All-zero partition header terminating the table
    fn null_partition() -> Self::PartitionHeader {
        let mut header = Self::PartitionHeader::from_words(&[0; PARTITION_HEADER_WORDS]);
        header.update_checksum();
        header
    }

    /// Decode an image header table read from an image
    fn decode_table(words: &[u32]) -> Result<ImageHeaderTable> {
        ImageHeaderTable::from_words(words, Self::TABLE_CHECKSUMMED)
    }
}

/// Reserve the image header table slot at the header cursor
pub(crate) fn reserve_table_slot(layout: &mut Layout, tail: TableTail) -> Result<ImageHeaderTable> {
    layout.table_slot = layout.header;
    layout.push_header(&[FILL_ERASED; IMAGE_HEADER_WORDS])?;

    let mut table = ImageHeaderTable::new(tail);
    table.part_hdr_off = layout.part_hdr_off / 4;
    Ok(table)
}

/// Word offset of partition header `index` in the partition header table
pub(crate) fn partition_header_word(layout: &Layout, index: usize) -> u32 {
    layout.part_hdr_off / 4 + (index * PARTITION_HEADER_WORDS) as u32
}

/// Pad `words` payload words at the content cursor to the payload alignment
pub(crate) fn pad_payload(layout: &mut Layout, words: usize) -> Result<usize> {
    let padded = words.div_ceil(PAYLOAD_ALIGN_WORDS) * PAYLOAD_ALIGN_WORDS;
    let content = layout.content;
    layout
        .arena_mut()
        .fill_words(content + words, padded - words, FILL_ERASED)?;
    Ok(padded)
}

/// Chip family a boot image is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Zynq-7000
    #[serde(rename = "zynq")]
    Zynq,
    /// Zynq UltraScale+ MPSoC
    #[serde(rename = "zynqmp")]
    ZynqMp,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Self::Zynq => Zynq::NAME,
            Self::ZynqMp => ZynqMp::NAME,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = BootImageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zynq" => Ok(Self::Zynq),
            "zynqmp" => Ok(Self::ZynqMp),
            other => Err(BootImageError::UnknownTarget(other.to_string())),
        }
    }
}
