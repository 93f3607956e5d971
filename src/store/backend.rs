//! Access-mode selection.
//!
//! A directory's physical read strategy is chosen once, at construction,
//! via [`AccessMode`]. Writes, listing, deletion and locking are identical
//! across modes; only how [`IndexInput`]s satisfy reads differs. Nothing
//! downstream inspects the mode again; the returned cursors carry their
//! strategy with them.

use std::path::Path;

use eyre::Result;

use super::fd::FdInput;
use super::input::IndexInput;
use super::mmap::{self, MmapInput};

/// Physical read strategy backing a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Positioned reads (`pread`-style) through an OS file descriptor.
    Fd,
    /// File regions mapped into the process address space.
    Mmap,
}

impl AccessMode {
    pub(crate) fn open_input(self, dir: &Path, name: &str) -> Result<IndexInput> {
        match self {
            AccessMode::Fd => Ok(IndexInput::Fd(FdInput::open(dir, name)?)),
            AccessMode::Mmap => Ok(IndexInput::Mmap(MmapInput::open(dir, name)?)),
        }
    }

    /// Whether closing inputs of this mode deterministically releases
    /// their backing resources on this platform. Always true for the
    /// descriptor-backed mode; for the mapped mode this mirrors
    /// [`mmap::UNMAP_SUPPORTED`](super::UNMAP_SUPPORTED).
    pub fn supports_unmap(self) -> bool {
        match self {
            AccessMode::Fd => true,
            AccessMode::Mmap => mmap::UNMAP_SUPPORTED,
        }
    }

    pub fn is_mmap(self) -> bool {
        matches!(self, AccessMode::Mmap)
    }
}
