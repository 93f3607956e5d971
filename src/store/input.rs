//! Type-erased read cursor.
//!
//! [`IndexInput`] wraps the two physical read strategies behind one enum
//! so callers never branch on how a directory was opened. Every operation
//! delegates; the variants agree byte-for-byte on what any file region
//! contains.

use eyre::Result;

use super::fd::FdInput;
use super::mmap::MmapInput;

/// Random-access, read-only cursor over one file.
///
/// Cursors are independently positioned: any number of them, from any mix
/// of directory instances and access modes, may coexist over one file.
#[derive(Debug)]
pub enum IndexInput {
    /// Positioned reads through an OS file descriptor.
    Fd(FdInput),
    /// Reads out of a memory-mapped region.
    Mmap(MmapInput),
}

impl IndexInput {
    pub fn name(&self) -> &str {
        match self {
            IndexInput::Fd(input) => input.name(),
            IndexInput::Mmap(input) => input.name(),
        }
    }

    /// Byte length of the underlying file, fixed at open.
    pub fn len(&self) -> u64 {
        match self {
            IndexInput::Fd(input) => input.len(),
            IndexInput::Mmap(input) => input.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        match self {
            IndexInput::Fd(input) => input.position(),
            IndexInput::Mmap(input) => input.position(),
        }
    }

    /// Repositions the cursor; positions past end-of-file only error once
    /// a read is attempted there.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        match self {
            IndexInput::Fd(input) => input.seek(position),
            IndexInput::Mmap(input) => input.seek(position),
        }
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        match self {
            IndexInput::Fd(input) => input.read_byte(),
            IndexInput::Mmap(input) => input.read_byte(),
        }
    }

    /// Reads exactly `len` bytes into `buf[offset..offset + len]`.
    ///
    /// `use_buffer` selects between the internally buffered copy path and
    /// a direct bulk transfer where the strategy distinguishes them; the
    /// bytes delivered are identical either way.
    pub fn read_bytes(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        len: usize,
        use_buffer: bool,
    ) -> Result<()> {
        match self {
            IndexInput::Fd(input) => input.read_bytes(buf, offset, len, use_buffer),
            IndexInput::Mmap(input) => input.read_bytes(buf, offset, len, use_buffer),
        }
    }

    /// An independently positioned cursor over the same file.
    pub fn try_clone(&self) -> Result<IndexInput> {
        match self {
            IndexInput::Fd(input) => Ok(IndexInput::Fd(input.try_clone()?)),
            IndexInput::Mmap(input) => Ok(IndexInput::Mmap(input.try_clone()?)),
        }
    }

    /// Hints to the OS that the given range will be read soon. A no-op
    /// for the descriptor-backed strategy.
    pub fn prefetch(&self, offset: u64, len: u64) {
        match self {
            IndexInput::Fd(_) => {}
            IndexInput::Mmap(input) => input.prefetch(offset, len),
        }
    }

    /// Releases backend resources (descriptor or mapping hold).
    /// Idempotent; reads afterwards fail with the closed-resource error.
    pub fn close(&mut self) -> Result<()> {
        match self {
            IndexInput::Fd(input) => input.close(),
            IndexInput::Mmap(input) => input.close(),
        }
    }
}
