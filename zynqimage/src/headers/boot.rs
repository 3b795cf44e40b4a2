//! Boot header shared by both targets

use crate::checksum::checksum;
use crate::error::{BootImageError, Result};

/// Size of the boot header in words, identical for both targets
pub const BOOT_HEADER_WORDS: usize = 560;

/// Size of the boot header in bytes
pub const BOOT_HEADER_SIZE: usize = BOOT_HEADER_WORDS * 4;

/// Interrupt vector table entry, a branch-to-self
pub const INT_TABLE_DEFAULT: u32 = 0xEAFF_FFFE;

/// Width detection word the boot ROM probes first
pub const WIDTH_DETECT: u32 = 0xAA99_5566;

/// `"XNLX"` as stored in the image
pub const IMAGE_ID: u32 = u32::from_le_bytes(*b"XNLX");

/// Key source: not encrypted
pub const ENCRYPTION_NONE: u32 = 0x0000_0000;

/// Documented as reserved 0, but reference images carry 1
pub const RESERVED_1_DEFAULT: u32 = 0x0000_0001;

/// Word index of the header checksum
pub const CHECKSUM_WORD: usize = 18;

/// First word covered by the header checksum
pub const CHECKSUM_FIRST_WORD: usize = 8;

/// Number of register initialization words
pub const REG_INIT_WORDS: usize = 512;

/// Fields at the same place in both targets' boot headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootHeaderCommon {
    pub interrupt_table: [u32; 8],
    pub width_detect: u32,
    pub image_id: u32,
    pub encryption_status: u32,
    /// Header version (Zynq) or FSBL execution address (ZynqMP)
    pub header_version: u32,
    /// Byte offset of the bootloader
    pub src_offset: u32,
    pub checksum: u32,
}

impl BootHeaderCommon {
    /// Default values taken from reference images
    pub fn new(header_version: u32) -> Self {
        Self {
            interrupt_table: [INT_TABLE_DEFAULT; 8],
            width_detect: WIDTH_DETECT,
            image_id: IMAGE_ID,
            encryption_status: ENCRYPTION_NONE,
            header_version,
            src_offset: 0,
            checksum: 0,
        }
    }

    /// Encode the first 19 words; `variant` are words 13 to 17
    pub fn encode_prefix(&self, variant: [u32; 5], out: &mut Vec<u32>) {
        out.extend_from_slice(&self.interrupt_table);
        out.extend_from_slice(&[
            self.width_detect,
            self.image_id,
            self.encryption_status,
            self.header_version,
            self.src_offset,
        ]);
        out.extend_from_slice(&variant);
        out.push(self.checksum);
    }

    /// Decode the first 19 words, returning the variant words 13 to 17
    pub fn decode_prefix(words: &[u32]) -> Result<(Self, [u32; 5])> {
        if words.len() < BOOT_HEADER_WORDS {
            return Err(BootImageError::invalid_image(format!(
                "boot header truncated: {} words",
                words.len()
            )));
        }
        let mut interrupt_table = [0u32; 8];
        interrupt_table.copy_from_slice(&words[..8]);
        let mut variant = [0u32; 5];
        variant.copy_from_slice(&words[13..18]);
        let common = Self {
            interrupt_table,
            width_detect: words[8],
            image_id: words[9],
            encryption_status: words[10],
            header_version: words[11],
            src_offset: words[12],
            checksum: words[CHECKSUM_WORD],
        };
        Ok((common, variant))
    }
}

/// Register init table with full memory access ranges
pub fn default_reg_init() -> [u32; REG_INIT_WORDS] {
    let mut table = [0u32; REG_INIT_WORDS];
    for pair in table.chunks_exact_mut(2) {
        pair[0] = 0xFFFF_FFFF;
        pair[1] = 0x0;
    }
    table
}

/// Encoding shared by the target specific boot headers
pub trait BootHeaderFormat {
    /// Shared fields
    fn common(&self) -> &BootHeaderCommon;

    /// Mutable shared fields
    fn common_mut(&mut self) -> &mut BootHeaderCommon;

    /// Encode all [`BOOT_HEADER_WORDS`] words
    fn to_words(&self) -> Vec<u32>;

    /// Byte offset of the image header table
    fn img_hdr_off(&self) -> u32;

    /// Byte offset of the partition header table
    fn part_hdr_off(&self) -> u32;

    /// Length of the bootloader in bytes
    fn bootloader_len(&self) -> u32;

    /// Recompute the checksum over width detect .. the word before it
    fn update_checksum(&mut self) {
        let words = self.to_words();
        self.common_mut().checksum = checksum(&words[CHECKSUM_FIRST_WORD..CHECKSUM_WORD]);
    }

    /// Whether the stored checksum matches the header
    fn checksum_valid(&self) -> bool {
        let words = self.to_words();
        checksum(&words[CHECKSUM_FIRST_WORD..CHECKSUM_WORD]) == words[CHECKSUM_WORD]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_id_bytes() {
        assert_eq!(IMAGE_ID.to_le_bytes(), *b"XNLX");
        assert_eq!(IMAGE_ID, 0x584C_4E58);
    }

    #[test]
    fn test_prefix_layout() {
        let mut common = BootHeaderCommon::new(0x0101_0000);
        common.src_offset = 0x1700;
        common.checksum = 0x1234_5678;

        let mut words = Vec::new();
        common.encode_prefix([1, 2, 3, 4, 5], &mut words);

        assert_eq!(words.len(), CHECKSUM_WORD + 1);
        assert_eq!(words[7], INT_TABLE_DEFAULT);
        assert_eq!(words[8], WIDTH_DETECT);
        assert_eq!(words[11], 0x0101_0000);
        assert_eq!(words[12], 0x1700);
        assert_eq!(&words[13..18], &[1, 2, 3, 4, 5]);
        assert_eq!(words[CHECKSUM_WORD], 0x1234_5678);
    }

    #[test]
    fn test_decode_prefix() {
        let mut common = BootHeaderCommon::new(0xFFFC_0000);
        common.src_offset = 0xB40;
        let mut words = Vec::new();
        common.encode_prefix([7, 0, 0, 7, 1], &mut words);
        words.resize(BOOT_HEADER_WORDS, 0);

        let (decoded, variant) = BootHeaderCommon::decode_prefix(&words).unwrap();
        assert_eq!(decoded, common);
        assert_eq!(variant, [7, 0, 0, 7, 1]);
        assert!(BootHeaderCommon::decode_prefix(&words[..100]).is_err());
    }

    #[test]
    fn test_reg_init_pairs() {
        let table = default_reg_init();
        assert_eq!(&table[..4], &[0xFFFF_FFFF, 0, 0xFFFF_FFFF, 0]);
        assert_eq!(table[REG_INIT_WORDS - 1], 0);
    }
}
