//! Sequential write-once output.
//!
//! An [`IndexOutput`] is the only way bytes enter a directory: an
//! append-only cursor over one freshly created file. There is no seek and
//! no rewrite; the file's length and content are finalized by `close()`,
//! and only then are they promised to readers on the same path.
//!
//! Creation is exclusive (`create_new`). A failed creation therefore never
//! leaves a zero-length file behind for other directory instances to see.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use eyre::{Result, WrapErr};

use crate::error::StoreError;

use super::BUFFER_SIZE;

/// Append-only writer bound to one file of a directory.
#[derive(Debug)]
pub struct IndexOutput {
    name: String,
    file: Option<File>,
    buffer: Vec<u8>,
    flushed: u64,
}

impl IndexOutput {
    pub(crate) fn create(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(name);

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::FileAlreadyExists {
                    name: name.to_string(),
                }
                .into());
            }
            Err(err) => {
                return Err(err)
                    .wrap_err_with(|| format!("failed to create output '{}'", path.display()));
            }
        };

        Ok(Self {
            name: name.to_string(),
            file: Some(file),
            buffer: Vec::with_capacity(BUFFER_SIZE),
            flushed: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes written so far, buffered or not.
    pub fn file_pointer(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.ensure_open()?;

        if self.buffer.len() == BUFFER_SIZE {
            self.flush_buffer()?;
        }
        self.buffer.push(b);

        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;

        if self.buffer.len() + bytes.len() <= BUFFER_SIZE {
            self.buffer.extend_from_slice(bytes);
            return Ok(());
        }

        self.flush_buffer()?;

        if bytes.len() >= BUFFER_SIZE {
            // Large transfers skip the buffer entirely.
            let Some(file) = self.file.as_mut() else {
                return Err(already_closed());
            };
            file.write_all(bytes)
                .wrap_err_with(|| format!("failed to write to '{}'", self.name))?;
            self.flushed += bytes.len() as u64;
        } else {
            self.buffer.extend_from_slice(bytes);
        }

        Ok(())
    }

    /// Flushes remaining bytes and finalizes the file's length.
    ///
    /// An output is closed exactly once: a second `close()` fails with
    /// the closed-resource error, as does any write after the first.
    /// Dropping an unclosed output discards its buffered bytes.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flush_buffer()?;

        let Some(mut file) = self.file.take() else {
            return Err(already_closed());
        };
        file.flush()
            .wrap_err_with(|| format!("failed to flush '{}'", self.name))?;

        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let Some(file) = self.file.as_mut() else {
            return Err(already_closed());
        };
        file.write_all(&self.buffer)
            .wrap_err_with(|| format!("failed to write to '{}'", self.name))?;

        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();

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
        resource: "IndexOutput",
    }
    .into()
}
