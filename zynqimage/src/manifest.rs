//! TOML boot image manifest
//!
//! ```toml
//! target = "zynqmp"
//!
//! [[partition]]
//! file = "pmufw.elf"
//! pmufw_image = true
//!
//! [[partition]]
//! file = "fsbl.elf"
//! bootloader = true
//! destination_cpu = "a53-0"
//!
//! [[partition]]
//! file = "u-boot.elf"
//! exception_level = "el-2"
//! ```

use crate::arch::Target;
use crate::builder::BootImageBuilder;
use crate::component::Component;
use crate::error::{BootImageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Boot image description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Chip family, may be given on the command line instead
    pub target: Option<Target>,
    /// Components in image order
    #[serde(default, rename = "partition")]
    pub partitions: Vec<Component>,
}

impl Manifest {
    /// Parse a manifest; paths are kept as written
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a manifest file, resolving relative paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BootImageError::InputFile {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_toml(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(manifest.resolve(base))
    }

    /// Resolve relative component paths against `base`
    pub fn resolve(mut self, base: &Path) -> Self {
        self.partitions = self
            .partitions
            .into_iter()
            .map(|c| if c.is_file() { c.resolve(base) } else { c })
            .collect();
        self
    }

    /// Builder for this manifest; `target` overrides the manifest's target
    pub fn builder(&self, target: Option<Target>) -> Result<BootImageBuilder> {
        let target = target.or(self.target).ok_or(BootImageError::MissingTarget)?;
        Ok(BootImageBuilder::new(target).components(self.partitions.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{DestinationCpu, ExceptionLevel, PartitionOwner};
    use std::path::PathBuf;

    const MANIFEST: &str = r#"
target = "zynqmp"

[[partition]]
file = "fsbl.elf"
bootloader = true
destination_cpu = "a53-0"

[[partition]]
fsbl_config = true

[[partition]]
file = "/boot/u-boot.bin"
load = 0x8000000
offset = 0x100000
partition_owner = "uboot"
exception_level = "el-2"
"#;

    #[test]
    fn test_parse() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        assert_eq!(manifest.target, Some(Target::ZynqMp));
        assert_eq!(manifest.partitions.len(), 3);

        let fsbl = &manifest.partitions[0];
        assert!(fsbl.bootloader);
        assert_eq!(fsbl.destination_cpu, DestinationCpu::A53_0);

        assert!(!manifest.partitions[1].is_file());

        let uboot = &manifest.partitions[2];
        assert_eq!(uboot.load, 0x800_0000);
        assert_eq!(uboot.offset, 0x10_0000);
        assert_eq!(uboot.partition_owner, PartitionOwner::Uboot);
        assert_eq!(uboot.exception_level, ExceptionLevel::El2);
    }

    #[test]
    fn test_resolve() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap().resolve(Path::new("/work"));
        assert_eq!(manifest.partitions[0].path, PathBuf::from("/work/fsbl.elf"));
        assert_eq!(manifest.partitions[1].path, PathBuf::new());
        assert_eq!(manifest.partitions[2].path, PathBuf::from("/boot/u-boot.bin"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = Manifest::from_toml("[[partition]]\nfile = \"a\"\nencryption = \"aes\"\n").unwrap_err();
        assert!(matches!(err, BootImageError::Manifest(_)));
    }

    #[test]
    fn test_target_override() {
        let manifest = Manifest::from_toml("[[partition]]\nfile = \"a.bin\"\n").unwrap();
        assert!(matches!(
            manifest.builder(None),
            Err(BootImageError::MissingTarget)
        ));
        assert_eq!(manifest.builder(Some(Target::Zynq)).unwrap().target(), Target::Zynq);
    }
}
