//! # segstore - Segment-File Storage for Search Indexes
//!
//! segstore is the storage substrate a search engine persists its segment
//! files on: a uniform [`Directory`] interface for sequential writes,
//! random-access reads, file enumeration and deletion, and cross-process
//! mutual-exclusion locking, backed by interchangeable physical access
//! strategies over the same on-disk path.
//!
//! ## Quick Start
//!
//! ```ignore
//! use segstore::{AccessMode, Directory};
//!
//! let dir = Directory::open("./index", AccessMode::Mmap)?;
//!
//! let mut out = dir.create_output("segments_1")?;
//! out.write_bytes(&payload)?;
//! out.close()?;
//!
//! let mut input = dir.open_input("segments_1")?;
//! input.seek(16)?;
//! let mut header = [0u8; 64];
//! input.read_bytes(&mut header, 0, 64, true)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Consumers (index, query layers)      │
//! ├─────────────────────────────────────────────┤
//! │               Directory façade              │
//! │   output · input · list · delete · lock     │
//! ├──────────────────────┬──────────────────────┤
//! │   Fd access mode     │   Mmap access mode   │
//! │   (positioned reads) │   (mapped regions)   │
//! ├──────────────────────┴──────────────────────┤
//! │           One filesystem path               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Two directory instances opened on the same path observe the same file
//! set and content, whether or not they share a process or an access mode.
//! The filesystem, not the instance, is the source of truth: a file
//! written and closed through one instance is immediately readable
//! through every other, byte for byte, and deletions are immediately
//! visible everywhere.
//!
//! ## Locking
//!
//! [`Directory::obtain_lock`] hands out named, path-scoped exclusive
//! tokens enforced through OS advisory file locks, so exclusion holds
//! across processes, not just threads. Acquisition never blocks; a
//! contended lock fails immediately.
//!
//! ## Module Overview
//!
//! - [`store`]: the directory façade, both access modes, outputs,
//!   inputs and locks
//! - [`profile`]: hierarchical timing bookkeeping for the layers above;
//!   consumes the store's primitives, never reaches into them
//! - [`error`]: the typed failure taxonomy

pub mod error;
pub mod profile;
pub mod store;

pub use error::StoreError;
pub use store::{
    AccessMode, Directory, IndexInput, IndexOutput, Lock, LockFactory, LockRegistry,
    BUFFER_SIZE, UNMAP_SUPPORTED,
};
