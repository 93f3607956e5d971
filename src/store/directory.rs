//! Directory façade.
//!
//! A [`Directory`] composes one filesystem path, one [`AccessMode`] and
//! one [`LockFactory`] into the storage view the rest of a search engine
//! consumes. Instances are cheap and independent: any number of them,
//! with any mix of access modes, may be opened over one path and must
//! observe the same file set and content. To that end nothing here is
//! cached: listings, lengths and existence always come from the
//! filesystem.
//!
//! ## Lifecycle
//!
//! A directory is `Open` from construction until [`close`](Directory::close),
//! which is idempotent. Every other operation begins with
//! [`ensure_open`](Directory::ensure_open) and fails with the
//! closed-resource error afterwards. Closing a directory does not close
//! outputs, inputs or locks it issued; those have their own lifecycles.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::{ensure, Result, WrapErr};

use crate::error::StoreError;

use super::backend::AccessMode;
use super::input::IndexInput;
use super::lock::{Lock, LockFactory};
use super::output::IndexOutput;

/// Façade over one filesystem path: sequential writes, random-access
/// reads, enumeration, deletion and locking.
#[derive(Debug)]
pub struct Directory {
    path: PathBuf,
    mode: AccessMode,
    lock_factory: LockFactory,
    open: AtomicBool,
}

impl Directory {
    /// Opens a directory over `path`, creating it if absent, with a
    /// fresh lock registry.
    ///
    /// Fails at construction if `path` exists and is not a directory.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        Self::open_with_factory(path, mode, LockFactory::default())
    }

    /// Opens a directory with an injected lock factory, so instances that
    /// should share an in-process lock namespace can be built over clones
    /// of one [`LockRegistry`](super::LockRegistry).
    pub fn open_with_factory<P: AsRef<Path>>(
        path: P,
        mode: AccessMode,
        lock_factory: LockFactory,
    ) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() && !path.is_dir() {
            return Err(StoreError::NotADirectory {
                path: path.to_path_buf(),
            }
            .into());
        }

        fs::create_dir_all(path)
            .wrap_err_with(|| format!("failed to create directory '{}'", path.display()))?;

        let path = path
            .canonicalize()
            .wrap_err_with(|| format!("failed to canonicalize '{}'", path.display()))?;

        Ok(Self {
            path,
            mode,
            lock_factory,
            open: AtomicBool::new(true),
        })
    }

    /// Canonical path this directory is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Fails with the closed-resource error once [`close`](Directory::close)
    /// has run. Called at the start of every other operation.
    pub fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(StoreError::AlreadyClosed {
                resource: "Directory",
            }
            .into());
        }
        Ok(())
    }

    /// Creates `name` for exclusive sequential writing.
    ///
    /// Fails if the file already exists; a failed creation leaves no file
    /// behind. The file's length and content become visible to other
    /// instances when the output is closed.
    pub fn create_output(&self, name: &str) -> Result<IndexOutput> {
        self.ensure_open()?;
        validate_name(name)?;
        IndexOutput::create(&self.path, name)
    }

    /// Opens `name` for random-access reading via this directory's mode.
    ///
    /// The result depends only on the file's bytes, never on which mode
    /// (or which instance) wrote it.
    pub fn open_input(&self, name: &str) -> Result<IndexInput> {
        self.ensure_open()?;
        validate_name(name)?;
        self.mode.open_input(&self.path, name)
    }

    /// Removes `name`. Immediately visible to every instance sharing the
    /// path.
    pub fn delete_file(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        validate_name(name)?;

        match fs::remove_file(self.path.join(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::FileNotFound {
                name: name.to_string(),
            }
            .into()),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to delete '{name}'")),
        }
    }

    /// Sorted names of the regular files at this path. Subdirectories
    /// and other non-file entries are excluded.
    pub fn list_all(&self) -> Result<Vec<String>> {
        self.ensure_open()?;

        let entries = fs::read_dir(&self.path)
            .wrap_err_with(|| format!("failed to list '{}'", self.path.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .wrap_err_with(|| format!("failed to list '{}'", self.path.display()))?;
            let file_type = entry
                .file_type()
                .wrap_err_with(|| format!("failed to stat '{:?}'", entry.file_name()))?;
            if !file_type.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    /// Exact byte length of `name`. Undefined while an output for `name`
    /// is still open.
    pub fn file_length(&self, name: &str) -> Result<u64> {
        self.ensure_open()?;
        validate_name(name)?;

        match fs::metadata(self.path.join(name)) {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::FileNotFound {
                name: name.to_string(),
            }
            .into()),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to stat '{name}'")),
        }
    }

    /// Acquires the named lock, failing fast if it is held by any
    /// directory instance or process sharing this path.
    pub fn obtain_lock(&self, name: &str) -> Result<Lock> {
        self.ensure_open()?;
        validate_name(name)?;
        self.lock_factory.obtain(&self.path, name)
    }

    /// Forces the named files' bytes to durable storage.
    pub fn sync<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_open()?;

        for name in names {
            let name = name.as_ref();
            validate_name(name)?;

            let file = match fs::File::open(self.path.join(name)) {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(StoreError::FileNotFound {
                        name: name.to_string(),
                    }
                    .into());
                }
                Err(err) => {
                    return Err(err).wrap_err_with(|| format!("failed to open '{name}' for sync"));
                }
            };
            file.sync_all()
                .wrap_err_with(|| format!("failed to sync '{name}'"))?;
        }

        Ok(())
    }

    /// Atomically renames `source` to `dest` within this path, replacing
    /// `dest` if present, then syncs the directory entry.
    pub fn rename(&self, source: &str, dest: &str) -> Result<()> {
        self.ensure_open()?;
        validate_name(source)?;
        validate_name(dest)?;

        if !self.path.join(source).exists() {
            return Err(StoreError::FileNotFound {
                name: source.to_string(),
            }
            .into());
        }

        fs::rename(self.path.join(source), self.path.join(dest))
            .wrap_err_with(|| format!("failed to rename '{source}' to '{dest}'"))?;

        self.sync_directory()
    }

    /// Transitions to `Closed`. Idempotent; afterwards every other
    /// operation fails with the closed-resource error. Outstanding
    /// outputs, inputs and locks are unaffected.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> Result<()> {
        let dir = fs::File::open(&self.path)
            .wrap_err_with(|| format!("failed to open '{}' for sync", self.path.display()))?;
        dir.sync_all()
            .wrap_err_with(|| format!("failed to sync directory '{}'", self.path.display()))
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> Result<()> {
        // Directory entries cannot be fsynced on this platform.
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "file name cannot be empty");
    ensure!(
        !name.contains('/') && !name.contains('\\'),
        "file name '{}' cannot contain path separators",
        name
    );
    ensure!(
        name != "." && name != "..",
        "file name '{}' cannot reference a directory",
        name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_directory() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("index");

        let dir = Directory::open(&path, AccessMode::Fd).unwrap();
        assert!(path.is_dir());
        assert!(dir.is_open());
        assert_eq!(dir.mode(), AccessMode::Fd);
    }

    #[test]
    fn open_over_regular_file_fails() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("afile");
        fs::write(&path, b"x").unwrap();

        for mode in [AccessMode::Fd, AccessMode::Mmap] {
            let err = Directory::open(&path, mode).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StoreError>(),
                Some(StoreError::NotADirectory { .. })
            ));
        }
    }

    #[test]
    fn list_all_is_sorted_and_skips_directories() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        fs::write(tmp.path().join("b_file"), b"").unwrap();
        fs::write(tmp.path().join("a_file"), b"").unwrap();
        fs::create_dir(tmp.path().join("subdir")).unwrap();

        assert_eq!(dir.list_all().unwrap(), vec!["a_file", "b_file"]);
    }

    #[test]
    fn file_length_reports_exact_bytes() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        let mut out = dir.create_output("data").unwrap();
        out.write_bytes(&[0u8; 1234]).unwrap();
        out.close().unwrap();

        assert_eq!(dir.file_length("data").unwrap(), 1234);

        let err = dir.file_length("absent").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::FileNotFound { name }) if name == "absent"
        ));
    }

    #[test]
    fn delete_missing_file_is_not_found() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        let err = dir.delete_file("absent").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::FileNotFound { name }) if name == "absent"
        ));
    }

    #[test]
    fn closed_directory_rejects_every_operation() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        let mut out = dir.create_output("data").unwrap();
        out.close().unwrap();

        dir.close();
        dir.close(); // idempotent
        assert!(!dir.is_open());

        let closed = |err: eyre::Report| {
            matches!(
                err.downcast_ref::<StoreError>(),
                Some(StoreError::AlreadyClosed {
                    resource: "Directory"
                })
            )
        };

        assert!(closed(dir.ensure_open().unwrap_err()));
        assert!(closed(dir.create_output("x").unwrap_err()));
        assert!(closed(dir.open_input("data").unwrap_err()));
        assert!(closed(dir.delete_file("data").unwrap_err()));
        assert!(closed(dir.list_all().unwrap_err()));
        assert!(closed(dir.file_length("data").unwrap_err()));
        assert!(closed(dir.obtain_lock("write.lock").unwrap_err()));
        assert!(closed(dir.sync(["data"]).unwrap_err()));
        assert!(closed(dir.rename("data", "other").unwrap_err()));
    }

    #[test]
    fn rename_replaces_destination() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        fs::write(tmp.path().join("pending"), b"new").unwrap();
        fs::write(tmp.path().join("current"), b"old").unwrap();

        dir.rename("pending", "current").unwrap();

        assert_eq!(fs::read(tmp.path().join("current")).unwrap(), b"new");
        assert!(!tmp.path().join("pending").exists());
    }

    #[test]
    fn rename_missing_source_is_not_found() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        let err = dir.rename("absent", "dest").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::FileNotFound { name }) if name == "absent"
        ));
    }

    #[test]
    fn sync_flushes_named_files() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        let mut out = dir.create_output("data").unwrap();
        out.write_bytes(b"payload").unwrap();
        out.close().unwrap();

        dir.sync(["data"]).unwrap();

        let err = dir.sync(["absent"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::FileNotFound { name }) if name == "absent"
        ));
    }

    #[test]
    fn names_with_separators_are_rejected() {
        let tmp = tempdir().unwrap();
        let dir = Directory::open(tmp.path(), AccessMode::Fd).unwrap();

        assert!(dir.create_output("a/b").is_err());
        assert!(dir.create_output("").is_err());
        assert!(dir.open_input("..").is_err());
        assert!(dir.delete_file("a\\b").is_err());
    }
}
