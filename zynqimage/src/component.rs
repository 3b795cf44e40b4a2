//! Component descriptors
//!
//! A component is one entry of the boot image description: a file plus the
//! attributes that control where and how it is placed. The list is produced
//! by a configuration front end (see [`crate::manifest`]) and is read-only to
//! the assembler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Owner of a partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionOwner {
    #[default]
    Fsbl,
    Uboot,
}

/// Device a partition is delivered to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationDevice {
    #[default]
    None,
    /// Processing system
    Ps,
    /// Programmable logic
    Pl,
}

/// CPU a partition is handed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationCpu {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "a53-0")]
    A53_0,
    #[serde(rename = "a53-1")]
    A53_1,
    #[serde(rename = "a53-2")]
    A53_2,
    #[serde(rename = "a53-3")]
    A53_3,
    #[serde(rename = "r5-0")]
    R5_0,
    #[serde(rename = "r5-1")]
    R5_1,
    #[serde(rename = "r5-lockstep")]
    R5Lockstep,
}

/// ARM exception level a partition runs at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionLevel {
    #[default]
    #[serde(rename = "el-0")]
    El0,
    #[serde(rename = "el-1")]
    El1,
    #[serde(rename = "el-2")]
    El2,
    #[serde(rename = "el-3")]
    El3,
}

/// One entry of the boot image description
///
/// The ZynqMP specific attributes (`pmufw_image`, `fsbl_config`, destination
/// device/CPU and exception level) are ignored by the Zynq target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Component {
    /// Input file
    #[serde(rename = "file")]
    pub path: PathBuf,
    /// Load address of raw payloads
    pub load: u32,
    /// Fixed byte offset in the image, 0 for automatic placement
    pub offset: u32,
    /// This component is the first stage bootloader
    pub bootloader: bool,
    /// PMU firmware to be prepended to the bootloader
    pub pmufw_image: bool,
    /// Attribute-only entry that does not refer to a file
    pub fsbl_config: bool,
    pub partition_owner: PartitionOwner,
    pub destination_device: DestinationDevice,
    pub destination_cpu: DestinationCpu,
    pub exception_level: ExceptionLevel,
}

impl Component {
    /// Create a descriptor for `path` with default attributes
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Mark as the first stage bootloader
    pub fn bootloader(mut self) -> Self {
        self.bootloader = true;
        self
    }

    /// Mark as PMU firmware
    pub fn pmufw_image(mut self) -> Self {
        self.pmufw_image = true;
        self
    }

    /// Mark as an attribute-only entry
    pub fn fsbl_config(mut self) -> Self {
        self.fsbl_config = true;
        self
    }

    /// Set the load address
    pub fn load_address(mut self, load: u32) -> Self {
        self.load = load;
        self
    }

    /// Set a fixed placement offset
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Set the partition owner
    pub fn owner(mut self, owner: PartitionOwner) -> Self {
        self.partition_owner = owner;
        self
    }

    /// Set the destination device
    pub fn destination_device(mut self, device: DestinationDevice) -> Self {
        self.destination_device = device;
        self
    }

    /// Set the destination CPU
    pub fn destination_cpu(mut self, cpu: DestinationCpu) -> Self {
        self.destination_cpu = cpu;
        self
    }

    /// Set the exception level
    pub fn exception_level(mut self, level: ExceptionLevel) -> Self {
        self.exception_level = level;
        self
    }

    /// Whether the entry refers to an input file
    pub fn is_file(&self) -> bool {
        !self.fsbl_config
    }

    /// Whether the entry becomes a partition of its own
    ///
    /// PMU firmware is folded into the bootloader partition on targets that
    /// carry one.
    pub fn produces_partition(&self, folds_pmufw: bool) -> bool {
        self.is_file() && !(folds_pmufw && self.pmufw_image)
    }

    /// File name stored in the image header
    pub fn image_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Resolve a relative path against `base`
    pub fn resolve(mut self, base: &Path) -> Self {
        if self.path.is_relative() {
            self.path = base.join(&self.path);
        }
        self
    }
}
