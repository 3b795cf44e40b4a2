//! Partition header encoding shared by both targets

use crate::checksum::checksum;
use crate::component::{Component, DestinationCpu, DestinationDevice, ExceptionLevel, PartitionOwner};

/// Size of a partition header in words
pub const PARTITION_HEADER_WORDS: usize = 16;

/// Size of a partition header in bytes
pub const PARTITION_HEADER_SIZE: usize = PARTITION_HEADER_WORDS * 4;

/// Partition attribute bit-field
pub mod attr {
    use super::*;

    pub const OWNER_SHIFT: u32 = 16;
    pub const OWNER_MASK: u32 = 0x3 << OWNER_SHIFT;
    pub const OWNER_UBOOT: u32 = 1 << OWNER_SHIFT;

    pub const RSA_USED: u32 = 1 << 15;

    pub const DEST_CPU_SHIFT: u32 = 8;
    pub const DEST_CPU_MASK: u32 = 0x7 << DEST_CPU_SHIFT;

    pub const ENCRYPTED: u32 = 1 << 7;

    pub const DEST_DEV_SHIFT: u32 = 4;
    pub const DEST_DEV_MASK: u32 = 0x7 << DEST_DEV_SHIFT;
    pub const DEST_DEV_PS: u32 = 1 << DEST_DEV_SHIFT;
    pub const DEST_DEV_PL: u32 = 2 << DEST_DEV_SHIFT;

    /// A5x execution state, set for AArch32
    pub const EXEC_STATE_32: u32 = 1 << 3;

    pub const EXC_LEVEL_SHIFT: u32 = 1;
    pub const EXC_LEVEL_MASK: u32 = 0x3 << EXC_LEVEL_SHIFT;
    pub const EXC_LEVEL_EL2: u32 = 2 << EXC_LEVEL_SHIFT;

    pub const TRUST_ZONE: u32 = 1;

    pub fn owner(owner: PartitionOwner) -> u32 {
        match owner {
            PartitionOwner::Fsbl => 0,
            PartitionOwner::Uboot => OWNER_UBOOT,
        }
    }

    pub fn destination_cpu(cpu: DestinationCpu) -> u32 {
        let index = match cpu {
            DestinationCpu::None => 0,
            DestinationCpu::A53_0 => 1,
            DestinationCpu::A53_1 => 2,
            DestinationCpu::A53_2 => 3,
            DestinationCpu::A53_3 => 4,
            DestinationCpu::R5_0 => 5,
            DestinationCpu::R5_1 => 6,
            DestinationCpu::R5Lockstep => 7,
        };
        index << DEST_CPU_SHIFT
    }

    pub fn destination_device(device: DestinationDevice) -> u32 {
        match device {
            DestinationDevice::None => 0,
            DestinationDevice::Ps => DEST_DEV_PS,
            DestinationDevice::Pl => DEST_DEV_PL,
        }
    }

    pub fn exception_level(level: ExceptionLevel) -> u32 {
        let index = match level {
            ExceptionLevel::El0 => 0,
            ExceptionLevel::El1 => 1,
            ExceptionLevel::El2 => 2,
            ExceptionLevel::El3 => 3,
        };
        index << EXC_LEVEL_SHIFT
    }

    /// Attribute word described by a component's settings
    pub fn from_component(component: &Component) -> u32 {
        owner(component.partition_owner)
            | destination_cpu(component.destination_cpu)
            | destination_device(component.destination_device)
            | exception_level(component.exception_level)
    }
}

/// Encoding shared by the target specific partition headers
///
/// Lengths are counted in words, offsets are word offsets into the image.
pub trait PartitionHeaderFormat: Sized {
    fn to_words(&self) -> [u32; PARTITION_HEADER_WORDS];

    fn from_words(words: &[u32; PARTITION_HEADER_WORDS]) -> Self;

    /// Checksum field
    fn checksum(&self) -> u32;

    /// Store `checksum` in the checksum field
    fn set_checksum(&mut self, checksum: u32);

    /// Partition data length in words
    fn pd_len(&self) -> u32;

    /// Total partition length in words
    fn total_len(&self) -> u32;

    /// Word offset of the partition data
    fn data_offset(&self) -> u32;

    fn attributes(&self) -> u32;

    fn load_address(&self) -> u64;

    fn exec_address(&self) -> u64;

    /// Recompute the checksum over words 0 to 14
    fn update_checksum(&mut self) {
        let sum = checksum(&self.to_words()[..PARTITION_HEADER_WORDS - 1]);
        self.set_checksum(sum);
    }

    fn checksum_valid(&self) -> bool {
        checksum(&self.to_words()[..PARTITION_HEADER_WORDS - 1]) == self.checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_from_component() {
        let component = Component::new("bl31.elf")
            .owner(PartitionOwner::Uboot)
            .destination_cpu(DestinationCpu::A53_0)
            .destination_device(DestinationDevice::Ps)
            .exception_level(ExceptionLevel::El3);
        assert_eq!(attr::from_component(&component), 0x1_0116);
    }

    #[test]
    fn test_default_component_has_no_attributes() {
        assert_eq!(attr::from_component(&Component::new("a.bin")), 0);
    }

    #[test]
    fn test_field_masks() {
        assert_eq!(attr::destination_cpu(DestinationCpu::R5Lockstep), attr::DEST_CPU_MASK);
        assert_eq!(attr::exception_level(ExceptionLevel::El3), attr::EXC_LEVEL_MASK);
        assert_eq!(attr::DEST_DEV_PL & attr::DEST_DEV_MASK, 0x20);
    }
}
