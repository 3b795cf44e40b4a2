//! Boot image inspection
//!
//! Reads an assembled image back: boot header, image header table, image
//! header chain and the partition each image header points at. Every offset
//! taken from the image is checked against its size before use.

use crate::arch::{Architecture, Target, Zynq, ZynqMp};
use crate::arena::WORD_SIZE;
use crate::error::{BootImageError, Result};
use crate::headers::attr;
use crate::headers::boot::WIDTH_DETECT;
use crate::headers::{
    BOOT_HEADER_WORDS, BootHeaderFormat, IMAGE_HEADER_WORDS, ImageHeader, PARTITION_HEADER_WORDS,
    PartitionHeaderFormat,
};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;

/// One partition of an inspected image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Name from the image header
    pub name: String,
    /// Byte offset of the partition data
    pub offset: usize,
    /// Partition length in bytes
    pub len: usize,
    pub load: u64,
    pub exec: u64,
    pub attributes: u32,
    /// Bytes at the end of the partition added by the assembler, such as
    /// the no-op word behind a Zynq PL bitstream
    pub trailer: usize,
}

impl PartitionInfo {
    /// Whether the partition holds FPGA configuration data
    pub fn is_bitstream(&self) -> bool {
        self.name.ends_with(".bit") || self.attributes & attr::DEST_DEV_MASK == attr::DEST_DEV_PL
    }

    /// The payload as it was loaded, without the trailer
    pub fn payload<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        let data = self.data(image)?;
        Ok(&data[..data.len() - self.trailer])
    }

    /// The partition's bytes within `image`
    pub fn data<'a>(&self, image: &'a [u8]) -> Result<&'a [u8]> {
        image
            .get(self.offset..self.offset + self.len)
            .ok_or_else(|| {
                BootImageError::invalid_image(format!(
                    "partition {} at {:#x} runs past the end of the image",
                    self.name, self.offset
                ))
            })
    }
}

/// Summary of an inspected image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub target: Target,
    /// Byte offset of the bootloader
    pub bootloader_offset: u32,
    /// Bootloader length in bytes
    pub bootloader_len: u32,
    pub partitions: Vec<PartitionInfo>,
}

/// Inspect a boot image built for `target`
pub fn inspect(target: Target, image: &[u8]) -> Result<ImageInfo> {
    match target {
        Target::Zynq => inspect_as::<Zynq>(target, image),
        Target::ZynqMp => inspect_as::<ZynqMp>(target, image),
    }
}

fn read_words(image: &[u8], offset: usize, count: usize, what: &str) -> Result<Vec<u32>> {
    let bytes = image
        .get(offset..offset + count * WORD_SIZE)
        .ok_or_else(|| {
            BootImageError::invalid_image(format!(
                "{what} at {offset:#x} lies outside the {:#x} byte image",
                image.len()
            ))
        })?;
    let mut words = vec![0u32; count];
    LittleEndian::read_u32_into(bytes, &mut words);
    Ok(words)
}

fn inspect_as<A: Architecture>(target: Target, image: &[u8]) -> Result<ImageInfo> {
    let words = read_words(image, 0, BOOT_HEADER_WORDS, "boot header")?;
    let header = A::decode_boot_header(&words)?;

    if header.common().width_detect != WIDTH_DETECT {
        return Err(BootImageError::invalid_image("width detection word not found"));
    }
    if !header.checksum_valid() {
        return Err(BootImageError::invalid_image("boot header checksum mismatch"));
    }

    let table_words = read_words(
        image,
        header.img_hdr_off() as usize,
        IMAGE_HEADER_WORDS,
        "image header table",
    )?;
    let table = A::decode_table(&table_words)?;
    if !table.checksum_valid() {
        return Err(BootImageError::invalid_image("image header table checksum mismatch"));
    }
    debug!(
        "{} image headers from word {:#x}",
        table.hdrs_count, table.part_img_hdr_off
    );

    let mut partitions = Vec::new();
    let mut next = table.part_img_hdr_off as usize;
    while next != 0 {
        if partitions.len() >= table.hdrs_count as usize {
            return Err(BootImageError::invalid_image(
                "image header chain is longer than the table says",
            ));
        }

        let words = read_words(image, next * WORD_SIZE, IMAGE_HEADER_WORDS, "image header")?;
        let image_header = ImageHeader::from_words(&words)?;

        let mut raw = [0u32; PARTITION_HEADER_WORDS];
        raw.copy_from_slice(&read_words(
            image,
            image_header.part_hdr_off as usize * WORD_SIZE,
            PARTITION_HEADER_WORDS,
            "partition header",
        )?);
        let partition = A::PartitionHeader::from_words(&raw);
        let name = image_header.name();
        if !partition.checksum_valid() {
            return Err(BootImageError::invalid_image(format!(
                "partition header checksum mismatch for {name}"
            )));
        }

        let mut info = PartitionInfo {
            name,
            offset: partition.data_offset() as usize * WORD_SIZE,
            len: partition.total_len() as usize * WORD_SIZE,
            load: partition.load_address(),
            exec: partition.exec_address(),
            attributes: partition.attributes(),
            trailer: 0,
        };
        let data = info.data(image)?;
        if let Some(trailer) = A::BITSTREAM_TRAILER
            && info.attributes == attr::DEST_DEV_PL
            && data.ends_with(&trailer)
        {
            info.trailer = trailer.len();
        }
        partitions.push(info);

        next = image_header.next_img_off as usize;
    }

    Ok(ImageInfo {
        target,
        bootloader_offset: header.common().src_offset,
        bootloader_len: header.bootloader_len(),
        partitions,
    })
}
