//! Bounds-checked output buffer

use crate::error::{BootImageError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Size of a boot image word in bytes
pub const WORD_SIZE: usize = 4;

/// The in-memory output image
///
/// Most offsets in the boot image format are word offsets, so the arena is
/// addressed by word index. Words are stored little-endian, the byte order of
/// both targets. Every access is checked against the buffer size.
#[derive(Debug, Clone)]
pub struct ImageArena {
    bytes: Vec<u8>,
}

impl ImageArena {
    /// Allocate a zeroed arena of `size` bytes
    pub fn new(size: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|source| BootImageError::Allocation { size, source })?;
        bytes.resize(size, 0);
        Ok(Self { bytes })
    }

    /// Capacity in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the arena has no capacity at all
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Capacity in whole words
    pub fn word_len(&self) -> usize {
        self.bytes.len() / WORD_SIZE
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(offset..end),
            _ => Err(BootImageError::OutOfBounds {
                offset,
                len,
                capacity: self.bytes.len(),
            }),
        }
    }

    /// Read the word at `index`
    pub fn read_word(&self, index: usize) -> Result<u32> {
        let range = self.range(index * WORD_SIZE, WORD_SIZE)?;
        Ok(LittleEndian::read_u32(&self.bytes[range]))
    }

    /// Write one word at `index`
    pub fn write_word(&mut self, index: usize, value: u32) -> Result<()> {
        let range = self.range(index * WORD_SIZE, WORD_SIZE)?;
        LittleEndian::write_u32(&mut self.bytes[range], value);
        Ok(())
    }

    /// Write consecutive words starting at `index`
    pub fn write_words(&mut self, index: usize, words: &[u32]) -> Result<()> {
        let range = self.range(index * WORD_SIZE, words.len() * WORD_SIZE)?;
        LittleEndian::write_u32_into(words, &mut self.bytes[range]);
        Ok(())
    }

    /// Fill `count` words starting at `index` with `value`
    pub fn fill_words(&mut self, index: usize, count: usize, value: u32) -> Result<()> {
        let range = self.range(index * WORD_SIZE, count * WORD_SIZE)?;
        for chunk in self.bytes[range].chunks_exact_mut(WORD_SIZE) {
            LittleEndian::write_u32(chunk, value);
        }
        Ok(())
    }

    /// Copy raw bytes to the word at `index`, zero-filling the rest of the
    /// last word
    pub fn write_bytes(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let padded = data.len().div_ceil(WORD_SIZE) * WORD_SIZE;
        let range = self.range(index * WORD_SIZE, padded)?;
        let (head, tail) = self.bytes[range].split_at_mut(data.len());
        head.copy_from_slice(data);
        tail.fill(0);
        Ok(())
    }

    /// Borrow a byte range
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes[range])
    }

    /// Turn the arena into the final image of `len` bytes
    pub fn into_image(mut self, len: usize) -> Result<Vec<u8>> {
        self.range(0, len)?;
        self.bytes.truncate(len);
        Ok(self.bytes)
    }
}
