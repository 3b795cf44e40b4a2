//! Zynq-7000

use super::{Architecture, pad_payload, partition_header_word, reserve_table_slot};
use crate::arena::ImageArena;
use crate::component::Component;
use crate::error::{BootImageError, Result};
use crate::headers::boot::{RESERVED_1_DEFAULT, REG_INIT_WORDS, default_reg_init};
use crate::headers::{
    BootHeaderCommon, BootHeaderFormat, IMAGE_HEADER_WORDS, ImageHeader, ImageHeaderTable,
    PARTITION_HEADER_WORDS, PartitionHeaderFormat, TableTail, attr,
};
use crate::layout::Layout;
use crate::loader::{ElfClass, OsImageType};
use log::debug;

pub const IMG_HDR_OFF: u32 = 0x8C0;
pub const PART_HDR_OFF: u32 = 0xC80;
pub const PART_HDR_END_PADDING: u32 = 0x3C;
pub const BINS_OFF: u32 = 0x1700;

/// Boot header version word
pub const HEADER_VERSION: u32 = 0x0101_0000;

/// Attribute of generic binary data
pub const BINARY_GENERAL: u32 = 0x01;
/// Attribute of device trees, shared with ramdisks in the boot ROM docs
pub const BINARY_RAMDISK: u32 = 0x02;
/// Attribute of kernels
pub const BINARY_LINUX: u32 = 0x00;

/// Word appended after a PL bitstream
pub const BITSTREAM_NOOP: [u8; 4] = [0x00, 0x00, 0x00, 0x20];

const USER_WORDS: usize = 21;
const TAIL_WORDS: usize = 8;

/// Zynq-7000 boot header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZynqBootHeader {
    pub common: BootHeaderCommon,
    /// Bootloader length in bytes
    pub img_len: u32,
    pub reserved_0: u32,
    pub start_of_exec: u32,
    pub total_img_len: u32,
    pub reserved_1: u32,
    /// User words, the last two hold the table offsets
    pub user_defined: [u32; USER_WORDS],
    pub reg_init: [u32; REG_INIT_WORDS],
    pub user_defined_1: [u32; TAIL_WORDS],
}

impl BootHeaderFormat for ZynqBootHeader {
    fn common(&self) -> &BootHeaderCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut BootHeaderCommon {
        &mut self.common
    }

    fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(crate::headers::BOOT_HEADER_WORDS);
        self.common.encode_prefix(
            [
                self.img_len,
                self.reserved_0,
                self.start_of_exec,
                self.total_img_len,
                self.reserved_1,
            ],
            &mut words,
        );
        words.extend_from_slice(&self.user_defined);
        words.extend_from_slice(&self.reg_init);
        words.extend_from_slice(&self.user_defined_1);
        words
    }

    fn img_hdr_off(&self) -> u32 {
        self.user_defined[19]
    }

    fn part_hdr_off(&self) -> u32 {
        self.user_defined[20]
    }

    fn bootloader_len(&self) -> u32 {
        self.img_len
    }
}

/// Zynq-7000 partition header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZynqPartitionHeader {
    pub pd_len: u32,
    pub ed_len: u32,
    pub total_len: u32,
    pub load: u32,
    pub exec: u32,
    /// Word offset of the partition data
    pub data_off: u32,
    pub attributes: u32,
    pub section_count: u32,
    pub checksum_off: u32,
    /// Word offset of the image header
    pub img_hdr_off: u32,
    pub cert_off: u32,
    pub reserved: [u32; 4],
    pub checksum: u32,
}

impl PartitionHeaderFormat for ZynqPartitionHeader {
    fn to_words(&self) -> [u32; PARTITION_HEADER_WORDS] {
        [
            self.pd_len,
            self.ed_len,
            self.total_len,
            self.load,
            self.exec,
            self.data_off,
            self.attributes,
            self.section_count,
            self.checksum_off,
            self.img_hdr_off,
            self.cert_off,
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
            self.reserved[3],
            self.checksum,
        ]
    }

    fn from_words(w: &[u32; PARTITION_HEADER_WORDS]) -> Self {
        Self {
            pd_len: w[0],
            ed_len: w[1],
            total_len: w[2],
            load: w[3],
            exec: w[4],
            data_off: w[5],
            attributes: w[6],
            section_count: w[7],
            checksum_off: w[8],
            img_hdr_off: w[9],
            cert_off: w[10],
            reserved: [w[11], w[12], w[13], w[14]],
            checksum: w[15],
        }
    }

    fn checksum(&self) -> u32 {
        self.checksum
    }

    fn set_checksum(&mut self, checksum: u32) {
        self.checksum = checksum;
    }

    fn pd_len(&self) -> u32 {
        self.pd_len
    }

    fn total_len(&self) -> u32 {
        self.total_len
    }

    fn data_offset(&self) -> u32 {
        self.data_off
    }

    fn attributes(&self) -> u32 {
        self.attributes
    }

    fn load_address(&self) -> u64 {
        self.load.into()
    }

    fn exec_address(&self) -> u64 {
        self.exec.into()
    }
}

/// Zynq-7000 family
#[derive(Debug, Clone, Copy, Default)]
pub struct Zynq;

impl Zynq {
    fn generic_partition(component: &Component, extra: u32) -> ZynqPartitionHeader {
        ZynqPartitionHeader {
            attributes: attr::DEST_DEV_PS | extra,
            load: component.load,
            ..Default::default()
        }
    }
}

impl Architecture for Zynq {
    const NAME: &'static str = "zynq";
    const APPEND_NULL_PARTITION: bool = false;
    const SUPPORTS_PMUFW: bool = false;
    const TABLE_CHECKSUMMED: bool = false;
    const BITSTREAM_TRAILER: Option<[u8; 4]> = Some(BITSTREAM_NOOP);

    type BootHeader = ZynqBootHeader;
    type PartitionHeader = ZynqPartitionHeader;

    fn init_layout(arena: ImageArena, _partition_count: usize) -> Layout {
        Layout::new(arena, IMG_HDR_OFF, PART_HDR_OFF, PART_HDR_END_PADDING, BINS_OFF)
    }

    fn init_header(layout: &Layout) -> ZynqBootHeader {
        let mut user_defined = [0u32; USER_WORDS];
        user_defined[19] = layout.img_hdr_off;
        user_defined[20] = layout.part_hdr_off;

        let mut header = ZynqBootHeader {
            common: BootHeaderCommon::new(HEADER_VERSION),
            img_len: 0,
            reserved_0: 0,
            start_of_exec: 0,
            total_img_len: 0,
            reserved_1: RESERVED_1_DEFAULT,
            user_defined,
            reg_init: default_reg_init(),
            user_defined_1: [0xFFFF_FFFF; TAIL_WORDS],
        };
        header.update_checksum();
        header
    }

    fn setup_bootloader(header: &mut ZynqBootHeader, layout: &Layout, len: u32) {
        header.common.src_offset = layout.content_offset();
        header.img_len = len;
        header.total_img_len = len;
        header.update_checksum();
        debug!(
            "bootloader at {:#x}, {len:#x} bytes",
            header.common.src_offset
        );
    }

    fn build_image_header_table(
        layout: &mut Layout,
        images: &mut [ImageHeader],
        partitions: &mut [ZynqPartitionHeader],
    ) -> Result<ImageHeaderTable> {
        let count = images.len();
        let limit = layout.part_hdr_off as usize / 4;

        let mut table = reserve_table_slot(layout, TableTail::Padding)?;
        table.hdrs_count = count as u32;

        for (i, (image, partition)) in images.iter_mut().zip(partitions.iter_mut()).enumerate() {
            if layout.header + IMAGE_HEADER_WORDS > limit {
                return Err(BootImageError::TooManyPartitions {
                    count,
                    limit: layout.part_hdr_off,
                });
            }
            let position = layout.header as u32;

            image.next_img_off = if i + 1 == count {
                0
            } else {
                position + IMAGE_HEADER_WORDS as u32
            };
            image.part_hdr_off = partition_header_word(layout, i);
            layout.push_header(&image.to_words())?;

            partition.img_hdr_off = position;
            partition.update_checksum();

            if i == 0 {
                table.part_img_hdr_off = position;
            }
        }

        Ok(table)
    }

    fn default_partition(component: &Component) -> ZynqPartitionHeader {
        Self::generic_partition(component, BINARY_GENERAL)
    }

    fn device_tree_partition(component: &Component) -> ZynqPartitionHeader {
        Self::generic_partition(component, BINARY_RAMDISK)
    }

    fn elf_partition(
        _component: &Component,
        _size: usize,
        load: u64,
        entry: u64,
        _class: ElfClass,
    ) -> ZynqPartitionHeader {
        ZynqPartitionHeader {
            attributes: attr::DEST_DEV_PS,
            load: load as u32,
            exec: entry as u32,
            ..Default::default()
        }
    }

    fn bitstream_partition(_component: &Component) -> ZynqPartitionHeader {
        ZynqPartitionHeader {
            attributes: attr::DEST_DEV_PL,
            ..Default::default()
        }
    }

    fn os_image_partition(component: &Component, image_type: OsImageType) -> ZynqPartitionHeader {
        let extra = match image_type {
            OsImageType::Kernel => BINARY_LINUX,
            OsImageType::Script => BINARY_GENERAL,
            OsImageType::Ramdisk | OsImageType::Other(_) => 0,
        };
        Self::generic_partition(component, extra)
    }

    fn finish_partition_header(
        header: &mut ZynqPartitionHeader,
        layout: &mut Layout,
        mut words: usize,
    ) -> Result<usize> {
        if header.attributes == attr::DEST_DEV_PL {
            let content = layout.content;
            layout
                .arena_mut()
                .write_bytes(content + words, &BITSTREAM_NOOP)?;
            words += 1;
        }

        let len = words as u32;
        header.pd_len = len;
        header.ed_len = len;
        header.total_len = len;
        header.section_count = 1;
        header.checksum_off = 0;
        header.cert_off = 0;
        header.reserved = [0; 4];
        header.data_off = layout.content as u32;

        pad_payload(layout, words)
    }

    fn decode_boot_header(words: &[u32]) -> Result<ZynqBootHeader> {
        let (common, variant) = BootHeaderCommon::decode_prefix(words)?;

        let mut user_defined = [0u32; USER_WORDS];
        user_defined.copy_from_slice(&words[19..19 + USER_WORDS]);
        let reg_start = 19 + USER_WORDS;
        let mut reg_init = [0u32; REG_INIT_WORDS];
        reg_init.copy_from_slice(&words[reg_start..reg_start + REG_INIT_WORDS]);
        let tail_start = reg_start + REG_INIT_WORDS;
        let mut user_defined_1 = [0u32; TAIL_WORDS];
        user_defined_1.copy_from_slice(&words[tail_start..tail_start + TAIL_WORDS]);

        Ok(ZynqBootHeader {
            common,
            img_len: variant[0],
            reserved_0: variant[1],
            start_of_exec: variant[2],
            total_img_len: variant[3],
            reserved_1: variant[4],
            user_defined,
            reg_init,
            user_defined_1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::BOOT_HEADER_WORDS;

    fn layout() -> Layout {
        Zynq::init_layout(ImageArena::new(0x4000).unwrap(), 1)
    }

    #[test]
    fn test_boot_header_words() {
        let header = Zynq::init_header(&layout());
        let words = header.to_words();

        assert_eq!(words.len(), BOOT_HEADER_WORDS);
        assert_eq!(words[11], HEADER_VERSION);
        assert_eq!(words[17], RESERVED_1_DEFAULT);
        assert_eq!(words[38], IMG_HDR_OFF);
        assert_eq!(words[39], PART_HDR_OFF);
        assert_eq!(&words[40..42], &[0xFFFF_FFFF, 0]);
        assert_eq!(&words[552..], &[0xFFFF_FFFF; 8]);
        assert!(header.checksum_valid());

        assert_eq!(Zynq::decode_boot_header(&words).unwrap(), header);
    }

    #[test]
    fn test_setup_bootloader() {
        let layout = layout();
        let mut header = Zynq::init_header(&layout);
        Zynq::setup_bootloader(&mut header, &layout, 0x1234);

        assert_eq!(header.common.src_offset, BINS_OFF);
        assert_eq!(header.img_len, 0x1234);
        assert_eq!(header.total_img_len, 0x1234);
        assert!(header.checksum_valid());
    }

    #[test]
    fn test_attribute_rules() {
        let component = Component::new("a.bin").load_address(0x1000_0000);
        let raw = Zynq::default_partition(&component);
        assert_eq!(raw.attributes, 0x11);
        assert_eq!(raw.load, 0x1000_0000);
        assert_eq!(Zynq::device_tree_partition(&component).attributes, 0x12);
        assert_eq!(Zynq::bitstream_partition(&component).attributes, 0x20);
        assert_eq!(Zynq::os_image_partition(&component, OsImageType::Kernel).attributes, 0x10);
        assert_eq!(Zynq::os_image_partition(&component, OsImageType::Ramdisk).attributes, 0x10);
        assert_eq!(Zynq::os_image_partition(&component, OsImageType::Script).attributes, 0x11);

        let elf = Zynq::elf_partition(&component, 64, 0x10_0000, 0x10_0040, ElfClass::Elf32);
        assert_eq!(elf.attributes, 0x10);
        assert_eq!((elf.load, elf.exec), (0x10_0000, 0x10_0040));
    }

    #[test]
    fn test_finish_pads_to_sixteen_words() {
        let mut layout = layout();
        let mut header = Zynq::default_partition(&Component::new("a.bin"));
        let padded = Zynq::finish_partition_header(&mut header, &mut layout, 5).unwrap();

        assert_eq!(padded, 16);
        assert_eq!(header.pd_len, 5);
        assert_eq!(header.total_len, 5);
        assert_eq!(header.section_count, 1);
        assert_eq!(header.data_off, BINS_OFF / 4);
        assert_eq!(layout.arena().read_word(layout.content + 5).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_finish_appends_bitstream_noop() {
        let mut layout = layout();
        let mut header = Zynq::bitstream_partition(&Component::new("top.bit"));
        let padded = Zynq::finish_partition_header(&mut header, &mut layout, 16).unwrap();

        assert_eq!(header.pd_len, 17);
        assert_eq!(padded, 32);
        assert_eq!(
            layout.arena().bytes((layout.content + 16) * 4, 4).unwrap(),
            &BITSTREAM_NOOP
        );
    }

    #[test]
    fn test_image_header_chain() {
        let mut layout = layout();
        let mut images = vec![ImageHeader::new("fsbl.elf"), ImageHeader::new("u-boot.elf")];
        let mut partitions = vec![ZynqPartitionHeader::default(); 2];

        let table = Zynq::build_image_header_table(&mut layout, &mut images, &mut partitions).unwrap();
        let first = IMG_HDR_OFF / 4 + 16;

        assert_eq!(table.hdrs_count, 2);
        assert_eq!(table.part_hdr_off, PART_HDR_OFF / 4);
        assert_eq!(table.part_img_hdr_off, first);
        assert_eq!(images[0].next_img_off, first + 16);
        assert_eq!(images[1].next_img_off, 0);
        assert_eq!(images[1].part_hdr_off, PART_HDR_OFF / 4 + 16);
        assert_eq!(partitions[1].img_hdr_off, first + 16);
        assert!(partitions.iter().all(|p| p.checksum_valid()));
        assert_eq!(layout.table_slot, IMG_HDR_OFF as usize / 4);
    }

    #[test]
    fn test_image_headers_must_fit_before_partition_table() {
        let mut layout = layout();
        let mut images = vec![ImageHeader::new("a.bin"); 15];
        let mut partitions = vec![ZynqPartitionHeader::default(); 15];

        let err = Zynq::build_image_header_table(&mut layout, &mut images, &mut partitions).unwrap_err();
        assert!(matches!(err, BootImageError::TooManyPartitions { count: 15, .. }));
    }
}
