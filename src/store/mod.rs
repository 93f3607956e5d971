//! # Segment-File Store
//!
//! This module provides the storage substrate a search index is built on:
//! a [`Directory`] façade over one filesystem path, exposing sequential
//! write-once outputs, random-access read inputs, file enumeration and
//! deletion, and cross-process mutual-exclusion locks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Directory                     │
//! │  create_output / open_input / delete_file     │
//! │  list_all / file_length / obtain_lock / sync  │
//! ├───────────────┬───────────────┬───────────────┤
//! │  IndexOutput  │  IndexInput   │ Lock/Factory  │
//! │  (sequential, │ (random       │ (advisory OS  │
//! │   buffered)   │  access)      │  file locks)  │
//! ├───────────────┼───────┬───────┼───────────────┤
//! │   std::fs     │ FdInput MmapInput │   fs2     │
//! │               │ (pread) (memmap2) │           │
//! └───────────────┴───────┴───────┴───────────────┘
//! ```
//!
//! ## Access Modes
//!
//! Two physical read strategies implement the same read contract and are
//! selected once, at directory construction, via [`AccessMode`]:
//!
//! - `Fd`: positioned reads (`pread`-style) through an OS file descriptor
//! - `Mmap`: file regions mapped into the process address space
//!
//! A file written through a directory in either mode is readable through
//! any directory opened on the same path, in either mode, with identical
//! length and content. The filesystem is the source of truth; directory
//! instances never cache listings or lengths.
//!
//! ## Visibility
//!
//! Bytes written through an [`IndexOutput`] become visible to other
//! directory instances when the output is closed. Files are treated as
//! immutable once their writer closes; deletion is immediately visible to
//! every instance sharing the path.
//!
//! ## Module Organization
//!
//! - `directory`: the façade composing a path, an access mode and a lock
//!   factory
//! - `backend`: access-mode selection and capability queries
//! - `output`: sequential buffered writer
//! - `input`: type-erased read cursor over both strategies
//! - `fd`: positioned-read input
//! - `mmap`: memory-mapped input
//! - `lock`: advisory locks with an injectable in-process registry

mod backend;
mod directory;
mod fd;
mod input;
mod lock;
mod mmap;
mod output;

pub use backend::AccessMode;
pub use directory::Directory;
pub use fd::FdInput;
pub use input::IndexInput;
pub use lock::{Lock, LockFactory, LockRegistry};
pub use mmap::{MmapInput, UNMAP_SUPPORTED};
pub use output::IndexOutput;

/// Size of the internal read and write buffers.
///
/// Small sequential operations are amortized through a buffer of this
/// size; transfers at least this large bypass it.
pub const BUFFER_SIZE: usize = 8192;
