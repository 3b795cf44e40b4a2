//! # zynqimage
//!
//! Boot image assembler for Xilinx Zynq-7000 and Zynq UltraScale+ MPSoC
//! devices. Takes an ordered list of components (FSBL, PMU firmware, U-Boot,
//! bitstreams, device trees, kernels) and produces the `BOOT.BIN` layout the
//! BootROM expects: boot header, image header table, image and partition
//! headers, then the payloads.
//!
//! ## Example
//!
//! ```no_run
//! use zynqimage::{BootImageBuilder, Component, Target};
//!
//! let size = BootImageBuilder::new(Target::ZynqMp)
//!     .component(Component::new("pmufw.elf").pmufw_image())
//!     .component(Component::new("fsbl.elf").bootloader())
//!     .component(Component::new("u-boot.elf"))
//!     .write_to_file("BOOT.BIN")?;
//! # Ok::<(), zynqimage::BootImageError>(())
//! ```

pub mod arch;
pub mod arena;
pub mod builder;
pub mod checksum;
pub mod cli;
pub mod component;
pub mod error;
pub mod headers;
pub mod inspect;
pub mod layout;
pub mod loader;
pub mod manifest;

pub use arch::{Architecture, Target};
pub use builder::{BootImageBuilder, assemble};
pub use checksum::checksum;
pub use component::Component;
pub use error::{BootImageError, Result};
pub use inspect::{ImageInfo, PartitionInfo, inspect};
pub use manifest::Manifest;

/// Current version of zynqimage
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
