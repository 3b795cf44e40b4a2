//! Error types for boot image assembly and inspection

use std::collections::TryReserveError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, BootImageError>;

/// Everything that can abort a boot image build or inspection
#[derive(Debug, Error)]
pub enum BootImageError {
    /// Generic I/O failure (output files, extraction)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input file is missing or unreadable
    #[error("could not read {}: {source}", path.display())]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input path exists but does not point at a regular file
    #[error("not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    /// The ELF parser rejected the file
    #[error("invalid ELF file: {0}")]
    Elf(#[from] object::read::Error),

    /// Parsed, but not an ELF class the loader handles
    #[error("unsupported ELF file: {0}")]
    UnsupportedElf(String),

    /// The ELF file has nothing to load
    #[error("ELF file has no loadable sections")]
    NoLoadableSections,

    /// The loadable range of an ELF file exceeds the caller's limit
    #[error("ELF image spans {size:#x} bytes, the limit is {max:#x}")]
    ElfTooLarge { size: u64, max: u64 },

    /// Malformed FPGA bitstream container
    #[error("invalid bitstream: {0}")]
    Bitstream(String),

    /// Malformed U-Boot legacy image
    #[error("invalid OS image: {0}")]
    OsImage(String),

    /// An explicit placement offset points into already written content
    #[error("binary sections overlapping: offset {offset:#x} lies before {cursor:#x}")]
    SectionOverlap { offset: u32, cursor: u32 },

    /// An access outside of the image buffer
    #[error("access of {len} bytes at {offset:#x} is outside the {capacity:#x} byte image buffer")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// Header tables would run into the next region
    #[error("{count} partitions do not fit in the header region ending at {limit:#x}")]
    TooManyPartitions { count: usize, limit: u32 },

    /// The boot header can only point at one bootloader
    #[error("more than one bootloader partition given")]
    MultipleBootloaders,

    /// The component list does not contain a single file
    #[error("no partitions to assemble")]
    NoPartitions,

    /// The image buffer could not be allocated
    #[error("could not allocate {size} bytes for the image: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: TryReserveError,
    },

    /// Target name not recognized
    #[error("unknown target {0:?}, expected \"zynq\" or \"zynqmp\"")]
    UnknownTarget(String),

    /// Neither the manifest nor the command line names a target
    #[error("no target given")]
    MissingTarget,

    /// Manifest could not be parsed
    #[error("invalid manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    /// An existing boot image failed validation
    #[error("invalid boot image: {0}")]
    InvalidImage(String),

    /// A failure attributed to one component of the build
    #[error("{}: {source}", path.display())]
    Component {
        path: PathBuf,
        #[source]
        source: Box<BootImageError>,
    },
}

impl BootImageError {
    /// Create a bitstream format error
    pub fn bitstream(msg: impl Into<String>) -> Self {
        Self::Bitstream(msg.into())
    }

    /// Create an OS image format error
    pub fn os_image(msg: impl Into<String>) -> Self {
        Self::OsImage(msg.into())
    }

    /// Create a boot image validation error
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Attach the path of the failing component
    pub fn in_component(self, path: &Path) -> Self {
        match self {
            // Already attributed
            err @ Self::Component { .. } => err,
            err => Self::Component {
                path: path.to_path_buf(),
                source: Box::new(err),
            },
        }
    }

    /// The error without any component attribution
    pub fn root_cause(&self) -> &BootImageError {
        match self {
            Self::Component { source, .. } => source.root_cause(),
            err => err,
        }
    }
}
