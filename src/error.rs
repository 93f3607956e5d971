//! # Storage Error Taxonomy
//!
//! Fallible operations across the crate return [`eyre::Result`] so call
//! sites can attach path and operation context with `wrap_err_with`.
//! Failures that belong to the storage contract itself (closed handles,
//! missing files, contended locks) are raised as typed [`StoreError`]
//! values carried inside the report; callers that need to discriminate
//! match with `report.downcast_ref::<StoreError>()`:
//!
//! ```ignore
//! match dir.open_input("missing").unwrap_err().downcast_ref::<StoreError>() {
//!     Some(StoreError::FileNotFound { name }) => println!("no such file: {name}"),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! Underlying OS failures (short reads, mapping errors, rename failures)
//! stay plain I/O errors wrapped with context; only contract-level
//! conditions get a variant here.

use std::path::PathBuf;

use thiserror::Error;

/// Contract-level failures raised by directories, outputs, inputs and locks.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation was invoked on a handle past its `close()` point.
    #[error("{resource} is already closed")]
    AlreadyClosed { resource: &'static str },

    /// The named file does not exist in the directory.
    #[error("file '{name}' not found")]
    FileNotFound { name: String },

    /// Exclusive creation found the file already present.
    #[error("file '{name}' already exists")]
    FileAlreadyExists { name: String },

    /// A directory was constructed over a path that exists but is not a
    /// directory (e.g. a regular file).
    #[error("path {path:?} exists and is not a directory")]
    NotADirectory { path: PathBuf },

    /// The named lock is already held, by this process or another.
    #[error("lock '{name}' is already held")]
    LockHeld { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_the_offending_name() {
        let err = StoreError::FileNotFound {
            name: "segments_1".to_string(),
        };
        assert_eq!(err.to_string(), "file 'segments_1' not found");

        let err = StoreError::LockHeld {
            name: "write.lock".to_string(),
        };
        assert_eq!(err.to_string(), "lock 'write.lock' is already held");
    }

    #[test]
    fn downcast_through_eyre_report() {
        let report: eyre::Report = StoreError::AlreadyClosed {
            resource: "Directory",
        }
        .into();

        assert!(matches!(
            report.downcast_ref::<StoreError>(),
            Some(StoreError::AlreadyClosed { resource: "Directory" })
        ));
    }
}
