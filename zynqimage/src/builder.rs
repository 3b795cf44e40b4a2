//! Boot image assembler
//!
//! Walks the component list once, placing payloads in the binaries region
//! and collecting image and partition headers. The header tables and the
//! boot header are written once every offset is known.

use crate::arch::zynqmp::PMUFW_MAX_SIZE;
use crate::arch::{Architecture, Target, Zynq, ZynqMp};
use crate::arena::{ImageArena, WORD_SIZE};
use crate::component::Component;
use crate::error::{BootImageError, Result};
use crate::headers::boot::BootHeaderFormat;
use crate::headers::{ImageHeader, PARTITION_HEADER_SIZE, PartitionHeaderFormat};
use crate::layout::{FILL_ERASED, Layout};
use crate::loader::{self, load_elf};
use log::{debug, info, warn};
use std::path::Path;

/// Base of the size estimate, the Zynq binaries offset
pub const ESTIMATE_BASE: u64 = crate::arch::zynq::BINS_OFF as u64;

/// Zero words written after the partition header table of larger images
const PART_HDR_TERMINATOR_WORDS: usize = 15;

/// Builder for boot images
///
/// Collects the component list and the target, then assembles the image in
/// one go.
#[derive(Debug, Clone)]
pub struct BootImageBuilder {
    target: Target,
    components: Vec<Component>,
}

impl BootImageBuilder {
    /// Create a builder for `target` with no components
    pub fn new(target: Target) -> Self {
        Self {
            target,
            components: Vec::new(),
        }
    }

    /// Append one component
    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Append several components, keeping their order
    pub fn components(mut self, components: impl IntoIterator<Item = Component>) -> Self {
        self.components.extend(components);
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// The components added so far
    pub fn get_components(&self) -> &[Component] {
        &self.components
    }

    /// Assemble the boot image
    pub fn build(&self) -> Result<Vec<u8>> {
        info!(
            "assembling {} image from {} components",
            self.target,
            self.components.len()
        );
        match self.target {
            Target::Zynq => assemble::<Zynq>(&self.components),
            Target::ZynqMp => assemble::<ZynqMp>(&self.components),
        }
    }

    /// Assemble the boot image and write it to `path`
    ///
    /// Nothing is written unless the whole build succeeds.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let image = self.build()?;
        std::fs::write(path.as_ref(), &image)?;
        Ok(image.len())
    }
}

/// Upper bound guess of the image size in bytes
///
/// An explicit offset restarts the running total at that offset; 3% are
/// added on top for padding. PMU firmware counts with its full region size.
pub fn estimate_image_size(components: &[Component]) -> Result<usize> {
    let mut estimate = ESTIMATE_BASE;
    for component in components.iter().filter(|c| c.is_file()) {
        let mut size =
            loader::input_size(&component.path).map_err(|e| e.in_component(&component.path))?;
        if component.pmufw_image {
            size = size.max(PMUFW_MAX_SIZE.into());
        }
        if component.offset != 0 {
            estimate = component.offset.into();
        }
        estimate += size;
    }
    Ok((estimate * 103 / 100) as usize)
}

/// Arena size for an estimate: the next power of two, in words
pub fn arena_capacity(estimate: usize) -> usize {
    estimate.max(2).next_power_of_two() * WORD_SIZE
}

/// Assemble a boot image for architecture `A`
pub fn assemble<A: Architecture>(components: &[Component]) -> Result<Vec<u8>> {
    let partition_count = components
        .iter()
        .filter(|c| c.produces_partition(A::SUPPORTS_PMUFW))
        .count();
    if partition_count == 0 {
        return Err(BootImageError::NoPartitions);
    }

    let estimate = estimate_image_size(components)?;
    let capacity = arena_capacity(estimate);
    debug!("estimated {estimate:#x} bytes, allocating {capacity:#x}");

    let mut layout = A::init_layout(ImageArena::new(capacity)?, partition_count);
    let mut header = A::init_header(&layout);
    debug!(
        "{}: image headers at {:#x}, partition headers at {:#x}, binaries at {:#x}",
        A::NAME,
        layout.img_hdr_off,
        layout.part_hdr_off,
        layout.bins_off
    );

    let mut images = Vec::with_capacity(partition_count);
    let mut partitions = Vec::with_capacity(partition_count + 1);
    let mut pmufw: Option<Vec<u8>> = None;
    let mut bootloader_placed = false;

    for (i, component) in components.iter().enumerate() {
        if !component.is_file() {
            continue;
        }

        if A::SUPPORTS_PMUFW && component.pmufw_image {
            let firmware = load_pmufw(&component.path).map_err(|e| e.in_component(&component.path))?;
            A::setup_pmufw(&mut header, PMUFW_MAX_SIZE);
            info!("{}: PMU firmware", component.path.display());
            pmufw = Some(firmware);
            continue;
        }

        if component.bootloader {
            if bootloader_placed {
                return Err(BootImageError::MultipleBootloaders.in_component(&component.path));
            }
            bootloader_placed = true;
        }

        let prefix = match (component.bootloader, pmufw.take()) {
            (true, Some(firmware)) => firmware,
            (_, pending) => {
                pmufw = pending;
                Vec::new()
            }
        };

        let is_last = i + 1 == components.len();
        let partition = place_component::<A>(&mut layout, &mut header, component, &prefix, is_last)
            .map_err(|e| e.in_component(&component.path))?;

        images.push(ImageHeader::new(&component.image_name()));
        partitions.push(partition);
    }

    if pmufw.is_some() {
        warn!("PMU firmware is not followed by a bootloader, it is left out of the image");
    }
    if !bootloader_placed {
        warn!("no bootloader given, the boot header does not point at any partition");
    }

    write_headers::<A>(&mut layout, &header, &mut images, &mut partitions, components.len())?;

    let len = layout.content * WORD_SIZE;
    info!("{} image: {len:#x} bytes", A::NAME);
    layout.into_arena().into_image(len)
}

/// Load PMU firmware into a zero-filled buffer of the full firmware size
fn load_pmufw(path: &Path) -> Result<Vec<u8>> {
    let data = loader::read_input(path)?;
    let image = load_elf(&data, PMUFW_MAX_SIZE.into())?;

    let mut firmware = vec![0u8; PMUFW_MAX_SIZE as usize];
    firmware[..image.data.len()].copy_from_slice(&image.data);
    Ok(firmware)
}

/// Place one component at the content cursor and return its partition
/// header
fn place_component<A: Architecture>(
    layout: &mut Layout,
    header: &mut A::BootHeader,
    component: &Component,
    prefix: &[u8],
    is_last: bool,
) -> Result<A::PartitionHeader> {
    if component.offset != 0 {
        let target = component.offset as usize / WORD_SIZE;
        if target < layout.content {
            return Err(BootImageError::SectionOverlap {
                offset: component.offset,
                cursor: layout.content_offset(),
            });
        }
        layout.pad_content_to(target, FILL_ERASED)?;
    }

    // ELF images get no more than what is left of the arena
    let free = layout
        .arena()
        .len()
        .saturating_sub(layout.content * WORD_SIZE + prefix.len());
    let payload = loader::load_payload(&component.path, free as u64)?;
    let mut partition = A::make_partition_header(component, &payload, prefix.len());

    let mut data = Vec::with_capacity(prefix.len() + payload.len() + WORD_SIZE);
    data.extend_from_slice(prefix);
    data.extend_from_slice(&payload.data);

    let end = data.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
    data.truncate(end);
    if payload.is_os_kernel() {
        // U-Boot expects some zero padding after a kernel image
        data.extend_from_slice(&[0; WORD_SIZE]);
    }

    let words = data.len().div_ceil(WORD_SIZE);
    let content = layout.content;
    layout.arena_mut().write_bytes(content, &data)?;
    let padded = A::finish_partition_header(&mut partition, layout, words)?;

    info!(
        "{}: {:?} at {:#x}, {:#x} bytes",
        component.image_name(),
        payload.kind,
        layout.content_offset(),
        data.len()
    );

    if component.bootloader {
        let len = (partition.pd_len() * WORD_SIZE as u32).saturating_sub(prefix.len() as u32);
        A::setup_bootloader(header, layout, len);
    }

    layout.content += if is_last {
        partition.pd_len() as usize
    } else {
        padded
    };
    Ok(partition)
}

/// Write the header tables and the boot header
fn write_headers<A: Architecture>(
    layout: &mut Layout,
    header: &A::BootHeader,
    images: &mut [ImageHeader],
    partitions: &mut Vec<A::PartitionHeader>,
    component_count: usize,
) -> Result<()> {
    let table = A::build_image_header_table(layout, images, partitions)?;
    let slot = layout.table_slot;
    layout.arena_mut().write_words(slot, &table.to_words())?;
    layout.pad_header_to(layout.part_hdr_off as usize / WORD_SIZE, FILL_ERASED)?;

    if A::APPEND_NULL_PARTITION {
        partitions.push(A::null_partition());
    }
    for partition in partitions.iter() {
        layout.push_header(&partition.to_words())?;
    }

    if layout.part_hdr_end_off != 0 {
        layout.part_hdr_end_off = layout.part_hdr_off
            + (partitions.len() * PARTITION_HEADER_SIZE) as u32
            + layout.part_hdr_end_off;
    }
    layout.pad_header_to(layout.part_hdr_end_off as usize / WORD_SIZE, 0)?;

    let bins = layout.bins_word();
    if component_count > 3 && layout.header < bins {
        let count = PART_HDR_TERMINATOR_WORDS.min(bins - layout.header);
        layout.push_header(&vec![0; count])?;
    }
    layout.pad_header_to(bins, FILL_ERASED)?;

    layout.arena_mut().write_words(0, &header.to_words())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn raw_file(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file
    }

    #[test]
    fn test_estimate() {
        let a = raw_file(&[1; 100]);
        let b = raw_file(&[1; 200]);
        let components = vec![
            Component::new(a.path()),
            Component::new("").fsbl_config(),
            Component::new(b.path()),
        ];
        assert_eq!(
            estimate_image_size(&components).unwrap(),
            (0x1700 + 300) * 103 / 100
        );

        let components = vec![Component::new(a.path()), Component::new(b.path()).offset(0x10000)];
        assert_eq!(
            estimate_image_size(&components).unwrap(),
            (0x10000 + 200) * 103 / 100
        );
    }

    #[test]
    fn test_arena_capacity() {
        assert_eq!(arena_capacity(0x1800), 0x2000 * 4);
        assert_eq!(arena_capacity(0x2000), 0x2000 * 4);
        assert_eq!(arena_capacity(0), 8);
    }

    #[test]
    fn test_empty_component_list() {
        let err = BootImageBuilder::new(Target::Zynq).build().unwrap_err();
        assert!(matches!(err, BootImageError::NoPartitions));

        let err = BootImageBuilder::new(Target::ZynqMp)
            .component(Component::new("").fsbl_config())
            .build()
            .unwrap_err();
        assert!(matches!(err, BootImageError::NoPartitions));
    }

    #[test]
    fn test_trailing_zeros_are_trimmed() {
        let file = raw_file(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0, 0, 0, 0, 0, 0, 0]);
        let image = BootImageBuilder::new(Target::Zynq)
            .component(Component::new(file.path()).bootloader())
            .build()
            .unwrap();

        // Last component: the cursor only advances by the data length
        assert_eq!(image.len(), 0x1700 + 8);
        assert_eq!(&image[0x1700..], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0, 0, 0]);
    }

    #[test]
    fn test_multiple_bootloaders() {
        let a = raw_file(&[1; 8]);
        let b = raw_file(&[2; 8]);
        let err = BootImageBuilder::new(Target::Zynq)
            .component(Component::new(a.path()).bootloader())
            .component(Component::new(b.path()).bootloader())
            .build()
            .unwrap_err();
        assert!(matches!(err.root_cause(), BootImageError::MultipleBootloaders));
    }

    #[test]
    fn test_missing_file_names_component() {
        let err = BootImageBuilder::new(Target::Zynq)
            .component(Component::new("/nonexistent/boot.bin"))
            .build()
            .unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/boot.bin"));
    }
}
