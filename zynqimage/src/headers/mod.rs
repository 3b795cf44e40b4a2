//! Boot image header records
//!
//! Every record is encoded field by field into little-endian words; nothing
//! relies on in-memory struct layout. The target specific boot and partition
//! header shapes live next to their targets in [`crate::arch`].

pub mod boot;
pub mod image;
pub mod partition;

pub use boot::{BOOT_HEADER_SIZE, BOOT_HEADER_WORDS, BootHeaderCommon, BootHeaderFormat};
pub use image::{IMAGE_HEADER_WORDS, ImageHeader, ImageHeaderTable, TableTail, pack_name, unpack_name};
pub use partition::{PARTITION_HEADER_SIZE, PARTITION_HEADER_WORDS, PartitionHeaderFormat, attr};
