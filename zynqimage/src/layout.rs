//! Layout cursors over the output image

use crate::arena::{ImageArena, WORD_SIZE};
use crate::error::{BootImageError, Result};

/// Fill word used between regions and after payloads
pub const FILL_ERASED: u32 = 0xFFFF_FFFF;

/// Offset model of one boot image build
///
/// The four region offsets are byte offsets fixed by the target. The content
/// and header cursors are word indices into the arena and only ever move
/// forward: headers live below `bins_off`, payloads at or above it.
#[derive(Debug)]
pub struct Layout {
    arena: ImageArena,

    /// Next free word for payload data
    pub content: usize,
    /// Next free word in the header region
    pub header: usize,
    /// Word reserved for the image header table
    pub table_slot: usize,

    /// Image header table offset
    pub img_hdr_off: u32,
    /// Partition header table offset
    pub part_hdr_off: u32,
    /// Zero padding after the partition header table, 0 if the target does
    /// not pad it; replaced by the end offset of the padding once the table
    /// size is known
    pub part_hdr_end_off: u32,
    /// Start of the binaries region
    pub bins_off: u32,
}

impl Layout {
    /// Place both cursors at the start of their regions
    pub fn new(
        arena: ImageArena,
        img_hdr_off: u32,
        part_hdr_off: u32,
        part_hdr_end_off: u32,
        bins_off: u32,
    ) -> Self {
        let header = img_hdr_off as usize / WORD_SIZE;
        Self {
            arena,
            content: bins_off as usize / WORD_SIZE,
            header,
            table_slot: header,
            img_hdr_off,
            part_hdr_off,
            part_hdr_end_off,
            bins_off,
        }
    }

    /// The underlying buffer
    pub fn arena(&self) -> &ImageArena {
        &self.arena
    }

    /// Mutable access to the underlying buffer
    pub fn arena_mut(&mut self) -> &mut ImageArena {
        &mut self.arena
    }

    /// Content cursor as a byte offset
    pub fn content_offset(&self) -> u32 {
        (self.content * WORD_SIZE) as u32
    }

    /// First word of the binaries region
    pub fn bins_word(&self) -> usize {
        self.bins_off as usize / WORD_SIZE
    }

    /// Pad the content cursor forward to word `target`
    pub fn pad_content_to(&mut self, target: usize, fill: u32) -> Result<()> {
        if target > self.content {
            self.arena
                .fill_words(self.content, target - self.content, fill)?;
            self.content = target;
        }
        Ok(())
    }

    /// Append words at the header cursor
    pub fn push_header(&mut self, words: &[u32]) -> Result<()> {
        let end = self.header + words.len();
        if end > self.bins_word() {
            return Err(BootImageError::TooManyPartitions {
                count: words.len(),
                limit: self.bins_off,
            });
        }
        self.arena.write_words(self.header, words)?;
        self.header = end;
        Ok(())
    }

    /// Pad the header cursor forward to word `target`
    pub fn pad_header_to(&mut self, target: usize, fill: u32) -> Result<()> {
        if target > self.header {
            let count = target - self.header;
            self.push_header(&vec![fill; count])?;
        }
        Ok(())
    }

    /// Hand the buffer back once the build is done
    pub fn into_arena(self) -> ImageArena {
        self.arena
    }
}
