//! Positioned-read input.
//!
//! `FdInput` satisfies random-access reads through `pread`-style positioned
//! I/O on an OS file descriptor: every transfer names its absolute offset,
//! so the descriptor's own cursor is never moved and clones sharing the
//! descriptor cannot disturb each other.
//!
//! Small reads are amortized through an internal buffer holding one
//! contiguous window of the file; callers can also request direct
//! transfers that bypass it. Both paths return identical bytes for the
//! same region.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use crate::error::StoreError;

use super::BUFFER_SIZE;

/// Random-access reader backed by positioned file-descriptor reads.
#[derive(Debug)]
pub struct FdInput {
    name: String,
    file: Option<File>,
    length: u64,
    position: u64,
    /// Window of file bytes starting at `buffer_start`.
    buffer: Vec<u8>,
    buffer_start: u64,
}

impl FdInput {
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

        Ok(Self {
            name: name.to_string(),
            file: Some(file),
            length,
            position: 0,
            buffer: Vec::with_capacity(BUFFER_SIZE),
            buffer_start: 0,
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
        if !self.buffered(self.position) {
            self.refill()?;
        }

        let offset = (self.position - self.buffer_start) as usize;
        let b = self.buffer[offset];
        self.position += 1;

        Ok(b)
    }

    /// Reads exactly `len` bytes into `buf[offset..offset + len]`.
    ///
    /// With `use_buffer` the tail of the transfer is routed through the
    /// internal window; without it the tail is read directly into the
    /// caller's buffer. The bytes delivered are identical either way.
    pub fn read_bytes(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        len: usize,
        use_buffer: bool,
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

        let mut dest = &mut buf[offset..offset + len];

        // Drain whatever the current window already covers.
        if self.buffered(self.position) {
            let start = (self.position - self.buffer_start) as usize;
            let take = (self.buffer.len() - start).min(dest.len());
            dest[..take].copy_from_slice(&self.buffer[start..start + take]);
            self.position += take as u64;
            let rest = dest;
            dest = &mut rest[take..];
        }

        if dest.is_empty() {
            return Ok(());
        }

        if use_buffer && dest.len() <= BUFFER_SIZE {
            // One refill covers the tail: the window reads at least
            // `dest.len()` bytes because the EOF bound was checked above.
            self.refill()?;
            let take = dest.len();
            dest.copy_from_slice(&self.buffer[..take]);
            self.position += take as u64;
        } else {
            let Some(file) = self.file.as_ref() else {
                return Err(already_closed());
            };
            read_exact_at(file, dest, self.position)
                .wrap_err_with(|| format!("failed to read '{}'", self.name))?;
            self.position += dest.len() as u64;
        }

        Ok(())
    }

    /// An independently positioned cursor over the same file, sharing the
    /// underlying descriptor.
    pub fn try_clone(&self) -> Result<FdInput> {
        let Some(file) = self.file.as_ref() else {
            return Err(already_closed());
        };
        let file = file
            .try_clone()
            .wrap_err_with(|| format!("failed to clone input '{}'", self.name))?;

        Ok(FdInput {
            name: self.name.clone(),
            file: Some(file),
            length: self.length,
            position: self.position,
            buffer: Vec::with_capacity(BUFFER_SIZE),
            buffer_start: 0,
        })
    }

    /// Releases the descriptor. Idempotent; reads afterwards fail with
    /// the closed-resource error.
    pub fn close(&mut self) -> Result<()> {
        self.file = None;
        self.buffer.clear();
        Ok(())
    }

    fn buffered(&self, position: u64) -> bool {
        position >= self.buffer_start && position < self.buffer_start + self.buffer.len() as u64
    }

    /// Reloads the window to start at the current position.
    fn refill(&mut self) -> Result<()> {
        let Some(file) = self.file.as_ref() else {
            return Err(already_closed());
        };
        ensure!(
            self.position < self.length,
            "read past EOF on '{}' (position {}, length {})",
            self.name,
            self.position,
            self.length
        );

        let want = (self.length - self.position).min(BUFFER_SIZE as u64) as usize;
        self.buffer.resize(want, 0);

        read_exact_at(file, &mut self.buffer, self.position)
            .wrap_err_with(|| format!("failed to read '{}'", self.name))?;
        self.buffer_start = self.position;

        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.file.is_none() {
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

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Fills `buf` from `offset`, looping over short reads.
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    while !buf.is_empty() {
        match read_at(file, buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "unexpected end of file",
                ));
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_pattern(dir: &Path, name: &str, len: usize) {
        let bytes: Vec<u8> = (0..len).map(|i| i as u8).collect();
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let dir = tempdir().unwrap();

        let err = FdInput::open(dir.path(), "absent").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::FileNotFound { name }) if name == "absent"
        ));
    }

    #[test]
    fn read_bytes_across_buffer_boundary() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", BUFFER_SIZE * 2 + 100);

        let mut input = FdInput::open(dir.path(), "data").unwrap();

        // Prime the window, then read a range straddling its edge.
        assert_eq!(input.read_byte().unwrap(), 0);
        input.seek(BUFFER_SIZE as u64 - 10).unwrap();

        let mut buf = vec![0u8; 20];
        input.read_bytes(&mut buf, 0, 20, true).unwrap();
        let expected: Vec<u8> = (BUFFER_SIZE - 10..BUFFER_SIZE + 10)
            .map(|i| i as u8)
            .collect();
        assert_eq!(buf, expected);
    }

    #[test]
    fn buffered_and_direct_reads_agree() {
        let dir = tempdir().unwrap();
        let len = BUFFER_SIZE * 3 + 31;
        write_pattern(dir.path(), "data", len);

        for offset in [0u64, 1, 8191, 8192, 8193, (len - 1) as u64] {
            let want = (len as u64 - offset).min(2 * BUFFER_SIZE as u64) as usize;

            let mut buffered = FdInput::open(dir.path(), "data").unwrap();
            buffered.seek(offset).unwrap();
            let mut a = vec![0u8; want];
            buffered.read_bytes(&mut a, 0, want, true).unwrap();

            let mut direct = FdInput::open(dir.path(), "data").unwrap();
            direct.seek(offset).unwrap();
            let mut b = vec![0u8; want];
            direct.read_bytes(&mut b, 0, want, false).unwrap();

            assert_eq!(a, b, "mismatch at offset {offset}");
        }
    }

    #[test]
    fn seek_past_eof_only_fails_on_read() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", 16);

        let mut input = FdInput::open(dir.path(), "data").unwrap();
        input.seek(100).unwrap();

        let err = input.read_byte().unwrap_err();
        assert!(err.to_string().contains("read past EOF"));
    }

    #[test]
    fn read_past_eof_via_bulk_read() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", 16);

        let mut input = FdInput::open(dir.path(), "data").unwrap();
        input.seek(10).unwrap();

        let mut buf = vec![0u8; 7];
        let err = input.read_bytes(&mut buf, 0, 7, true).unwrap_err();
        assert!(err.to_string().contains("read past EOF"));
    }

    #[test]
    fn clone_positions_are_independent() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", 64);

        let mut input = FdInput::open(dir.path(), "data").unwrap();
        input.seek(10).unwrap();

        let mut other = input.try_clone().unwrap();
        assert_eq!(other.position(), 10);

        other.seek(32).unwrap();
        assert_eq!(other.read_byte().unwrap(), 32);
        assert_eq!(input.read_byte().unwrap(), 10);
    }

    #[test]
    fn read_after_close_fails() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", 16);

        let mut input = FdInput::open(dir.path(), "data").unwrap();
        input.close().unwrap();
        input.close().unwrap();

        let err = input.read_byte().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::AlreadyClosed { resource: "IndexInput" })
        ));
    }

    #[test]
    fn empty_file_reads_nothing() {
        let dir = tempdir().unwrap();
        write_pattern(dir.path(), "data", 0);

        let mut input = FdInput::open(dir.path(), "data").unwrap();
        assert_eq!(input.len(), 0);

        let mut buf = [0u8; 0];
        input.read_bytes(&mut buf, 0, 0, true).unwrap();
        assert!(input.read_byte().is_err());
    }
}
