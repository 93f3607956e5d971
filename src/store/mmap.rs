//! Memory-mapped input.
//!
//! `MmapInput` maps the file into the process address space once, at open,
//! and serves every read from that mapping. The OS handles paging
//! transparently, so repeated random access costs pointer arithmetic plus
//! page faults instead of syscalls.
//!
//! ## Mapping Lifetime
//!
//! The mapping is shared behind an `Arc`: clones of an input hold the same
//! region, and the region is unmapped when the last cursor over it is
//! closed or dropped. Reads always reflect the file's content at the time
//! the mapping was established; data files are immutable once their
//! writer closes, so a mapping never goes stale.
//!
//! ## Unmap Capability
//!
//! [`UNMAP_SUPPORTED`] reports at compile time whether dropping a mapping
//! deterministically releases the region on this platform. Callers use it
//! to gate unmap-sensitive validation paths; read correctness never
//! depends on it.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};
use memmap2::Mmap;

use crate::error::StoreError;

/// Whether dropping a mapping deterministically unmaps the region.
///
/// On unix and windows `memmap2` unmaps on drop; there is no deferred
/// reclamation to wait for. Platforms outside those families keep the
/// flag false so callers skip unmap-sensitive test paths.
pub const UNMAP_SUPPORTED: bool = cfg!(any(unix, windows));

/// Random-access reader over a memory-mapped file region.
#[derive(Debug)]
pub struct MmapInput {
    name: String,
    /// `None` for zero-length files, which cannot be mapped.
    region: Option<Arc<Mmap>>,
    length: u64,
    position: u64,
    closed: bool,
}

impl MmapInput {
    pub(crate) fn open(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(name);

        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::FileNotFound {
                    name: name.to_string(),
                }
                .into());
            }
            Err(err) => {
                return Err(err)
                    .wrap_err_with(|| format!("failed to open input '{}'", path.display()));
            }
        };

        let length = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        let region = if length == 0 {
            None
        } else {
            // SAFETY: Mmap::map is unsafe because the mapped file could be
            // truncated or rewritten externally. This is safe because:
            // 1. Data files are write-once: content is final when the
            //    writing IndexOutput closes, and inputs only open after.
            // 2. The mapping is read-only; nothing in this process writes
            //    through it.
            // 3. The Arc ties the region's lifetime to the cursors over
            //    it, preventing use-after-unmap.
            // 4. All access goes through read_byte/read_bytes, which
            //    bounds-check against the length captured at map time.
            let map = unsafe {
                Mmap::map(&file)
                    .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
            };
            Some(Arc::new(map))
        };

        // The descriptor is released here; the mapping outlives it.
        drop(file);

        Ok(Self {
            name: name.to_string(),
            region,
            length,
            position: 0,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Repositions the cursor. Positions past end-of-file are accepted;
    /// the error surfaces once a read is attempted there.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        self.position = position;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        self.ensure_open()?;
        ensure!(
            self.position < self.length,
            "read past EOF on '{}' (position {}, length {})",
            self.name,
            self.position,
            self.length
        );

        let Some(region) = self.region.as_ref() else {
            return Err(already_closed());
        };
        let b = region[self.position as usize];
        self.position += 1;

        Ok(b)
    }

    /// Reads exactly `len` bytes into `buf[offset..offset + len]`.
    ///
    /// The transfer is a copy out of the mapping either way; `use_buffer`
    /// exists for signature parity with the positioned-read input.
    pub fn read_bytes(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        len: usize,
        _use_buffer: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        ensure!(
            offset.checked_add(len).is_some_and(|end| end <= buf.len()),
            "destination range {}..{}+{} out of bounds for buffer of {} bytes",
            offset,
            offset,
            len,
            buf.len()
        );
        ensure!(
            self.position + len as u64 <= self.length,
            "read past EOF on '{}' (position {}, want {}, length {})",
            self.name,
            self.position,
            len,
            self.length
        );

        if len == 0 {
            return Ok(());
        }

        let Some(region) = self.region.as_ref() else {
            return Err(already_closed());
        };
        let start = self.position as usize;
        buf[offset..offset + len].copy_from_slice(&region[start..start + len]);
        self.position += len as u64;

        Ok(())
    }

    /// An independently positioned cursor sharing this mapping.
    pub fn try_clone(&self) -> Result<MmapInput> {
        self.ensure_open()?;

        Ok(MmapInput {
            name: self.name.clone(),
            region: self.region.clone(),
            length: self.length,
            position: self.position,
            closed: false,
        })
    }

    /// Hints to the OS that the given range will be read soon.
    #[cfg(unix)]
    pub fn prefetch(&self, offset: u64, len: u64) {
        let Some(region) = self.region.as_ref() else {
            return;
        };
        if self.closed || offset >= self.length {
            return;
        }

        // madvise wants a page-aligned start; round down and widen.
        let page = 4096u64;
        let start = offset & !(page - 1);
        let end = (offset + len).min(self.length);
        let span = (end - start) as usize;

        // SAFETY: madvise with MADV_WILLNEED is a kernel hint. This is
        // safe because:
        // 1. start was clamped below self.length and rounded down, so it
        //    falls inside the mapping.
        // 2. end is clamped to self.length, so start + span never exceeds
        //    the mapped range.
        // 3. The region is kept alive by the Arc for the duration of the
        //    call.
        unsafe {
            libc::madvise(
                region.as_ptr().add(start as usize) as *mut libc::c_void,
                span,
                libc::MADV_WILLNEED,
            );
        }
    }

    #[cfg(not(unix))]
    pub fn prefetch(&self, _offset: u64, _len: u64) {}

    /// Drops this cursor's hold on the mapping. The region is unmapped
    /// once every clone has been closed or dropped. Idempotent; reads
    /// afterwards fail with the closed-resource error.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.region = None;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(already_closed());
        }
        Ok(())
    }
}

fn already_closed() -> eyre::Report {
    StoreError::AlreadyClosed {
        resource: "IndexInput",
    }
    .into()
}
