//! Zynq UltraScale+ MPSoC

use super::{Architecture, pad_payload, partition_header_word, reserve_table_slot};
use crate::arena::ImageArena;
use crate::component::Component;
use crate::error::Result;
use crate::headers::boot::{RESERVED_1_DEFAULT, REG_INIT_WORDS, default_reg_init};
use crate::headers::image::BOOT_DEVICE_SAME;
use crate::headers::{
    BOOT_HEADER_WORDS, BootHeaderCommon, BootHeaderFormat, IMAGE_HEADER_WORDS, ImageHeader,
    ImageHeaderTable, PARTITION_HEADER_SIZE, PARTITION_HEADER_WORDS, PartitionHeaderFormat,
    TableTail, attr,
};
use crate::layout::Layout;
use crate::loader::{ElfClass, OsImageType};
use log::debug;

pub const IMG_HDR_OFF: u32 = 0x8C0;

/// Gap between the partition header table and the binaries
pub const OFFSET_AFTER_HEADERS: u32 = 0x40;

/// FSBL execution address stored in the header version word
pub const FSBL_EXEC_ADDR: u32 = 0xFFFC_0000;

/// Reserved word that follows the obfuscated key
pub const RESERVED_ZYNQMP: u32 = 0x0100_0020;

/// FSBL target CPU: A53 in 64-bit mode
pub const FSBL_CPU_A53_64: u32 = 0x800;

/// Size of the PMU firmware region
pub const PMUFW_MAX_SIZE: u32 = 0x0001_FAE0;

/// Attribute added to kernel images
pub const BINARY_LINUX: u32 = 0x00;

const OBFUSCATED_KEY_WORDS: usize = 8;
const USER_WORDS: usize = 12;
const IV_WORDS: usize = 3;
const PADDING_WORDS: usize = 2;

/// ZynqMP boot header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZynqMpBootHeader {
    pub common: BootHeaderCommon,
    /// PMU firmware length in bytes
    pub pmufw_len: u32,
    pub pmufw_total_len: u32,
    /// FSBL length in bytes
    pub fsbl_img_len: u32,
    pub total_img_len: u32,
    pub fsbl_target_cpu: u32,
    pub obfuscated_key: [u32; OBFUSCATED_KEY_WORDS],
    pub reserved: u32,
    /// User words, [10] and [11] hold the table offsets
    pub user_defined: [u32; USER_WORDS],
    pub sec_hdr_init_vec: [u32; IV_WORDS],
    pub obf_key_init_vec: [u32; IV_WORDS],
    pub reg_init: [u32; REG_INIT_WORDS],
    pub padding: [u32; PADDING_WORDS],
}

impl BootHeaderFormat for ZynqMpBootHeader {
    fn common(&self) -> &BootHeaderCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut BootHeaderCommon {
        &mut self.common
    }

    fn to_words(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(BOOT_HEADER_WORDS);
        self.common.encode_prefix(
            [
                self.pmufw_len,
                self.pmufw_total_len,
                self.fsbl_img_len,
                self.total_img_len,
                self.fsbl_target_cpu,
            ],
            &mut words,
        );
        words.extend_from_slice(&self.obfuscated_key);
        words.push(self.reserved);
        words.extend_from_slice(&self.user_defined);
        words.extend_from_slice(&self.sec_hdr_init_vec);
        words.extend_from_slice(&self.obf_key_init_vec);
        words.extend_from_slice(&self.reg_init);
        words.extend_from_slice(&self.padding);
        words
    }

    fn img_hdr_off(&self) -> u32 {
        self.user_defined[10]
    }

    fn part_hdr_off(&self) -> u32 {
        self.user_defined[11]
    }

    fn bootloader_len(&self) -> u32 {
        self.fsbl_img_len
    }
}

/// ZynqMP partition header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZynqMpPartitionHeader {
    pub pd_len: u32,
    pub ed_len: u32,
    pub total_len: u32,
    /// Word offset of the next partition header, 0 for the last
    pub next_part_hdr_off: u32,
    pub exec_lo: u32,
    pub exec_hi: u32,
    pub load_lo: u32,
    pub load_hi: u32,
    /// Word offset of the partition data
    pub actual_part_off: u32,
    pub attributes: u32,
    pub section_count: u32,
    pub checksum_off: u32,
    /// Word offset of the image header
    pub img_hdr_off: u32,
    pub cert_off: u32,
    pub reserved: u32,
    pub checksum: u32,
}

impl PartitionHeaderFormat for ZynqMpPartitionHeader {
    fn to_words(&self) -> [u32; PARTITION_HEADER_WORDS] {
        [
            self.pd_len,
            self.ed_len,
            self.total_len,
            self.next_part_hdr_off,
            self.exec_lo,
            self.exec_hi,
            self.load_lo,
            self.load_hi,
            self.actual_part_off,
            self.attributes,
            self.section_count,
            self.checksum_off,
            self.img_hdr_off,
            self.cert_off,
            self.reserved,
            self.checksum,
        ]
    }

    fn from_words(w: &[u32; PARTITION_HEADER_WORDS]) -> Self {
        Self {
            pd_len: w[0],
            ed_len: w[1],
            total_len: w[2],
            next_part_hdr_off: w[3],
            exec_lo: w[4],
            exec_hi: w[5],
            load_lo: w[6],
            load_hi: w[7],
            actual_part_off: w[8],
            attributes: w[9],
            section_count: w[10],
            checksum_off: w[11],
            img_hdr_off: w[12],
            cert_off: w[13],
            reserved: w[14],
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
        self.actual_part_off
    }

    fn attributes(&self) -> u32 {
        self.attributes
    }

    fn load_address(&self) -> u64 {
        (u64::from(self.load_hi) << 32) | u64::from(self.load_lo)
    }

    fn exec_address(&self) -> u64 {
        (u64::from(self.exec_hi) << 32) | u64::from(self.exec_lo)
    }
}

fn split(addr: u64) -> (u32, u32) {
    (addr as u32, (addr >> 32) as u32)
}

/// Zynq UltraScale+ MPSoC family
#[derive(Debug, Clone, Copy, Default)]
pub struct ZynqMp;

impl Architecture for ZynqMp {
    const NAME: &'static str = "zynqmp";
    const APPEND_NULL_PARTITION: bool = true;
    const SUPPORTS_PMUFW: bool = true;
    const TABLE_CHECKSUMMED: bool = true;
    const BITSTREAM_TRAILER: Option<[u8; 4]> = None;

    type BootHeader = ZynqMpBootHeader;
    type PartitionHeader = ZynqMpPartitionHeader;

    fn init_layout(arena: ImageArena, partition_count: usize) -> Layout {
        let count = partition_count as u32;
        let part_hdr_off =
            IMG_HDR_OFF + (IMAGE_HEADER_WORDS as u32 * 4) * (count + 1);
        let bins_off = part_hdr_off + PARTITION_HEADER_SIZE as u32 * count + OFFSET_AFTER_HEADERS;
        Layout::new(arena, IMG_HDR_OFF, part_hdr_off, 0, bins_off)
    }

    fn init_header(layout: &Layout) -> ZynqMpBootHeader {
        let mut user_defined = [0u32; USER_WORDS];
        user_defined[10] = layout.img_hdr_off;
        user_defined[11] = layout.part_hdr_off;

        let mut header = ZynqMpBootHeader {
            common: BootHeaderCommon::new(FSBL_EXEC_ADDR),
            pmufw_len: 0,
            pmufw_total_len: 0,
            fsbl_img_len: 0,
            total_img_len: 0,
            fsbl_target_cpu: RESERVED_1_DEFAULT,
            obfuscated_key: [0; OBFUSCATED_KEY_WORDS],
            reserved: RESERVED_ZYNQMP,
            user_defined,
            sec_hdr_init_vec: [0; IV_WORDS],
            obf_key_init_vec: [0; IV_WORDS],
            reg_init: default_reg_init(),
            padding: [0xFFFF_FFFF; PADDING_WORDS],
        };
        header.update_checksum();
        header
    }

    fn setup_bootloader(header: &mut ZynqMpBootHeader, layout: &Layout, len: u32) {
        let len = len.div_ceil(8) * 8;
        header.common.src_offset = layout.content_offset();
        header.fsbl_img_len = len;
        header.total_img_len = len;
        header.fsbl_target_cpu = FSBL_CPU_A53_64;
        header.update_checksum();
        debug!(
            "bootloader at {:#x}, {len:#x} bytes",
            header.common.src_offset
        );
    }

    fn setup_pmufw(header: &mut ZynqMpBootHeader, len: u32) {
        header.pmufw_len = len;
        header.pmufw_total_len = len;
        header.update_checksum();
    }

    fn build_image_header_table(
        layout: &mut Layout,
        images: &mut [ImageHeader],
        partitions: &mut [ZynqMpPartitionHeader],
    ) -> Result<ImageHeaderTable> {
        let count = images.len();

        let mut table = reserve_table_slot(
            layout,
            TableTail::BootDevice {
                boot_device: BOOT_DEVICE_SAME,
                checksum: 0,
            },
        )?;
        table.hdrs_count = count as u32;

        for i in 0..count.min(partitions.len()) {
            let position = layout.header as u32;
            let image = &mut images[i];

            image.part_hdr_off = partition_header_word(layout, i);
            image.next_img_off = if i + 1 == count {
                0
            } else {
                position + IMAGE_HEADER_WORDS as u32
            };

            partitions[i].next_part_hdr_off = 0;
            if i > 0 {
                let previous = &mut partitions[i - 1];
                previous.next_part_hdr_off = image.part_hdr_off;
                previous.update_checksum();
            }

            layout.push_header(&image.to_words())?;
            partitions[i].img_hdr_off = position;

            if i + 1 == count {
                partitions[i].update_checksum();
            }
            if i == 0 {
                table.part_img_hdr_off = position;
            }
        }

        table.update_checksum();
        Ok(table)
    }

    fn default_partition(component: &Component) -> ZynqMpPartitionHeader {
        ZynqMpPartitionHeader {
            attributes: attr::from_component(component),
            load_lo: component.load,
            ..Default::default()
        }
    }

    fn device_tree_partition(component: &Component) -> ZynqMpPartitionHeader {
        Self::default_partition(component)
    }

    fn elf_partition(
        component: &Component,
        size: usize,
        load: u64,
        entry: u64,
        class: ElfClass,
    ) -> ZynqMpPartitionHeader {
        let words = size.div_ceil(4) as u32;
        let (load_lo, load_hi) = split(load);
        let (exec_lo, exec_hi) = split(entry);

        let mut attributes = attr::from_component(component);
        if class == ElfClass::Elf32 {
            // 32-bit images always run at EL2
            attributes |= attr::EXEC_STATE_32;
            attributes = (attributes & !attr::EXC_LEVEL_MASK) | attr::EXC_LEVEL_EL2;
        }

        ZynqMpPartitionHeader {
            pd_len: words,
            ed_len: words,
            total_len: words,
            load_lo,
            load_hi,
            exec_lo,
            exec_hi,
            attributes,
            ..Default::default()
        }
    }

    fn bitstream_partition(component: &Component) -> ZynqMpPartitionHeader {
        ZynqMpPartitionHeader {
            attributes: attr::from_component(component),
            load_lo: 0xFFFF_FFFF,
            ..Default::default()
        }
    }

    fn os_image_partition(component: &Component, image_type: OsImageType) -> ZynqMpPartitionHeader {
        let attributes = match image_type {
            OsImageType::Ramdisk | OsImageType::Script => 0,
            OsImageType::Kernel => attr::from_component(component) | attr::DEST_DEV_PS | BINARY_LINUX,
            OsImageType::Other(_) => attr::from_component(component) | attr::DEST_DEV_PS,
        };
        ZynqMpPartitionHeader {
            attributes,
            load_lo: component.load,
            ..Default::default()
        }
    }

    fn finish_partition_header(
        header: &mut ZynqMpPartitionHeader,
        layout: &mut Layout,
        words: usize,
    ) -> Result<usize> {
        let len = words as u32;
        if header.pd_len == 0 {
            header.pd_len = len;
        }
        if header.ed_len == 0 {
            header.ed_len = len;
        }
        if header.total_len == 0 {
            header.total_len = len;
        }
        header.checksum_off = 0;
        header.section_count = 1;
        header.next_part_hdr_off = 0;
        header.actual_part_off = layout.content as u32;

        pad_payload(layout, words)
    }

    fn decode_boot_header(words: &[u32]) -> Result<ZynqMpBootHeader> {
        let (common, variant) = BootHeaderCommon::decode_prefix(words)?;

        let mut pos = 19;
        let mut take = |out: &mut [u32]| {
            out.copy_from_slice(&words[pos..pos + out.len()]);
            pos += out.len();
        };

        let mut obfuscated_key = [0u32; OBFUSCATED_KEY_WORDS];
        take(&mut obfuscated_key);
        let mut reserved = [0u32; 1];
        take(&mut reserved);
        let mut user_defined = [0u32; USER_WORDS];
        take(&mut user_defined);
        let mut sec_hdr_init_vec = [0u32; IV_WORDS];
        take(&mut sec_hdr_init_vec);
        let mut obf_key_init_vec = [0u32; IV_WORDS];
        take(&mut obf_key_init_vec);
        let mut reg_init = [0u32; REG_INIT_WORDS];
        take(&mut reg_init);
        let mut padding = [0u32; PADDING_WORDS];
        take(&mut padding);

        Ok(ZynqMpBootHeader {
            common,
            pmufw_len: variant[0],
            pmufw_total_len: variant[1],
            fsbl_img_len: variant[2],
            total_img_len: variant[3],
            fsbl_target_cpu: variant[4],
            obfuscated_key,
            reserved: reserved[0],
            user_defined,
            sec_hdr_init_vec,
            obf_key_init_vec,
            reg_init,
            padding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{DestinationCpu, ExceptionLevel};

    fn layout(count: usize) -> Layout {
        ZynqMp::init_layout(ImageArena::new(0x4000).unwrap(), count)
    }

    #[test]
    fn test_layout_depends_on_partition_count() {
        let layout = layout(3);
        assert_eq!(layout.part_hdr_off, 0x8C0 + 64 + 3 * 64);
        assert_eq!(layout.bins_off, layout.part_hdr_off + 3 * 64 + 0x40);
        assert_eq!(layout.part_hdr_end_off, 0);
        assert_eq!(layout.content, layout.bins_off as usize / 4);
    }

    #[test]
    fn test_boot_header_words() {
        let layout = layout(2);
        let header = ZynqMp::init_header(&layout);
        let words = header.to_words();

        assert_eq!(words.len(), BOOT_HEADER_WORDS);
        assert_eq!(words[11], FSBL_EXEC_ADDR);
        assert_eq!(words[17], 1);
        assert_eq!(&words[19..27], &[0; 8]);
        assert_eq!(words[27], RESERVED_ZYNQMP);
        assert_eq!(words[38], IMG_HDR_OFF);
        assert_eq!(words[39], layout.part_hdr_off);
        assert_eq!(&words[46..48], &[0xFFFF_FFFF, 0]);
        assert_eq!(&words[558..], &[0xFFFF_FFFF; 2]);
        assert!(header.checksum_valid());

        assert_eq!(ZynqMp::decode_boot_header(&words).unwrap(), header);
    }

    #[test]
    fn test_setup_bootloader_rounds_to_eight() {
        let layout = layout(1);
        let mut header = ZynqMp::init_header(&layout);
        ZynqMp::setup_bootloader(&mut header, &layout, 0x1001);

        assert_eq!(header.common.src_offset, layout.bins_off);
        assert_eq!(header.fsbl_img_len, 0x1008);
        assert_eq!(header.total_img_len, 0x1008);
        assert_eq!(header.fsbl_target_cpu, FSBL_CPU_A53_64);
        assert!(header.checksum_valid());
    }

    #[test]
    fn test_setup_pmufw() {
        let mut header = ZynqMp::init_header(&layout(1));
        ZynqMp::setup_pmufw(&mut header, PMUFW_MAX_SIZE);
        assert_eq!(header.pmufw_len, PMUFW_MAX_SIZE);
        assert_eq!(header.pmufw_total_len, PMUFW_MAX_SIZE);
        assert!(header.checksum_valid());
    }

    #[test]
    fn test_elf_attributes() {
        let component = Component::new("bl31.elf")
            .destination_cpu(DestinationCpu::A53_0)
            .exception_level(ExceptionLevel::El3);

        let elf64 = ZynqMp::elf_partition(&component, 10, 0x1_FFFE_0000, 0xFFFE_0000, ElfClass::Elf64);
        assert_eq!(elf64.attributes, 0x106);
        assert_eq!(elf64.pd_len, 3);
        assert_eq!((elf64.load_lo, elf64.load_hi), (0xFFFE_0000, 1));
        assert_eq!(elf64.load_address(), 0x1_FFFE_0000);
        assert_eq!(elf64.exec_address(), 0xFFFE_0000);

        let elf32 = ZynqMp::elf_partition(&component, 8, 0x0, 0x0, ElfClass::Elf32);
        assert_eq!(elf32.attributes, 0x100 | attr::EXEC_STATE_32 | attr::EXC_LEVEL_EL2);
    }

    #[test]
    fn test_kind_rules() {
        let component = Component::new("image.ub").load_address(0x1000_0000);
        assert_eq!(ZynqMp::bitstream_partition(&component).load_lo, 0xFFFF_FFFF);
        assert_eq!(ZynqMp::os_image_partition(&component, OsImageType::Ramdisk).attributes, 0);
        assert_eq!(ZynqMp::os_image_partition(&component, OsImageType::Script).attributes, 0);
        let kernel = ZynqMp::os_image_partition(&component, OsImageType::Kernel);
        assert_eq!(kernel.attributes, attr::DEST_DEV_PS);
        assert_eq!(kernel.load_lo, 0x1000_0000);
    }

    #[test]
    fn test_finish_keeps_preset_lengths() {
        let mut layout = layout(1);
        let mut header = ZynqMp::elf_partition(&Component::new("a.elf"), 40, 0, 0, ElfClass::Elf64);
        let padded = ZynqMp::finish_partition_header(&mut header, &mut layout, 9).unwrap();

        assert_eq!(padded, 16);
        assert_eq!(header.pd_len, 10);
        assert_eq!(header.section_count, 1);
        assert_eq!(header.actual_part_off, layout.content as u32);
    }

    #[test]
    fn test_partition_headers_are_linked() {
        let mut layout = layout(3);
        let mut images = vec![ImageHeader::new("a"), ImageHeader::new("b"), ImageHeader::new("c")];
        let mut partitions = vec![ZynqMpPartitionHeader::default(); 3];

        let table = ZynqMp::build_image_header_table(&mut layout, &mut images, &mut partitions).unwrap();

        let base = layout.part_hdr_off / 4;
        assert_eq!(partitions[0].next_part_hdr_off, base + 16);
        assert_eq!(partitions[1].next_part_hdr_off, base + 32);
        assert_eq!(partitions[2].next_part_hdr_off, 0);
        assert!(partitions.iter().all(|p| p.checksum_valid()));
        assert!(table.checksum_valid());
        assert_eq!(table.part_img_hdr_off, IMG_HDR_OFF / 4 + 16);
        assert_eq!(layout.header, layout.part_hdr_off as usize / 4);
    }
}
