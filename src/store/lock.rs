//! Cross-process mutual-exclusion locks.
//!
//! A lock is a named token scoped to one directory path. Exclusivity is
//! enforced at two layers:
//!
//! 1. An in-process reservation table ([`LockRegistry`]) keyed by the
//!    canonical marker-file path. The registry is an explicit,
//!    constructible component injected into each [`LockFactory`]; there
//!    is no process-global singleton.
//! 2. An OS advisory exclusive lock (`flock`/`LockFileEx`) on a marker
//!    file in the directory, which also excludes holders in other
//!    processes and in directory instances built over a different
//!    registry.
//!
//! Acquisition never blocks: a contended lock fails immediately with
//! [`StoreError::LockHeld`]. Marker files are created on first use and
//! deliberately left in place on release; deleting them would race with
//! a concurrent acquisition of the same name.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use parking_lot::Mutex;

use crate::error::StoreError;

/// In-process table of held lock markers, keyed by canonical path.
///
/// Cloning yields a handle on the same table, so factories (and the
/// directories built over them) that should share one lock namespace are
/// given clones of one registry. Exclusivity across *distinct* registries
/// still holds through the OS lock.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of locks currently held through this registry.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn reserve(&self, marker: &Path, name: &str) -> Result<()> {
        let mut held = self.held.lock();
        if !held.insert(marker.to_path_buf()) {
            return Err(StoreError::LockHeld {
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn release(&self, marker: &Path) {
        self.held.lock().remove(marker);
    }
}

/// Creates [`Lock`]s for a directory path, backed by a [`LockRegistry`].
#[derive(Debug, Clone, Default)]
pub struct LockFactory {
    registry: LockRegistry,
}

impl LockFactory {
    pub fn new(registry: LockRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    /// Attempts atomic acquisition of the named lock under `dir`.
    ///
    /// Fails fast with [`StoreError::LockHeld`] if the lock is held
    /// anywhere: this registry, another registry in this process, or
    /// another process entirely.
    pub fn obtain(&self, dir: &Path, name: &str) -> Result<Lock> {
        let marker_path = dir.join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&marker_path)
            .wrap_err_with(|| {
                format!("failed to create lock marker '{}'", marker_path.display())
            })?;

        // Canonicalize after creation so the registry key is stable no
        // matter how the directory path was spelled.
        let marker = marker_path.canonicalize().wrap_err_with(|| {
            format!("failed to canonicalize lock marker '{}'", marker_path.display())
        })?;

        self.registry.reserve(&marker, name)?;

        if let Err(err) = fs2::FileExt::try_lock_exclusive(&file) {
            self.registry.release(&marker);
            if err.kind() == fs2::lock_contended_error().kind() {
                return Err(StoreError::LockHeld {
                    name: name.to_string(),
                }
                .into());
            }
            return Err(err)
                .wrap_err_with(|| format!("failed to lock marker '{}'", marker.display()));
        }

        Ok(Lock {
            name: name.to_string(),
            marker,
            file: Some(file),
            registry: self.registry.clone(),
        })
    }
}

/// A held mutual-exclusion token.
///
/// Releases on [`close`](Lock::close) or on drop, whichever comes first;
/// a held lock cannot outlive its owner. Closing the directory that
/// issued it does not release it.
#[derive(Debug)]
pub struct Lock {
    name: String,
    marker: PathBuf,
    file: Option<File>,
    registry: LockRegistry,
}

impl Lock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases the OS lock and the registry reservation. A subsequent
    /// obtain of the same name, from any instance, succeeds.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        // Dropping the descriptor releases the OS lock even if the
        // explicit unlock fails, so the reservation always comes out.
        let unlocked = fs2::FileExt::unlock(&file)
            .wrap_err_with(|| format!("failed to unlock marker '{}'", self.marker.display()));
        self.registry.release(&self.marker);

        unlocked
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn obtain_and_release_round_trip() {
        let dir = tempdir().unwrap();
        let factory = LockFactory::default();

        let lock = factory.obtain(dir.path(), "write.lock").unwrap();
        assert_eq!(lock.name(), "write.lock");
        assert_eq!(factory.registry().held_count(), 1);

        lock.close().unwrap();
        assert_eq!(factory.registry().held_count(), 0);

        // Reacquire after release.
        let lock = factory.obtain(dir.path(), "write.lock").unwrap();
        lock.close().unwrap();
    }

    #[test]
    fn contention_within_one_registry_fails_fast() {
        let dir = tempdir().unwrap();
        let factory = LockFactory::default();

        let _held = factory.obtain(dir.path(), "write.lock").unwrap();

        let err = factory.obtain(dir.path(), "write.lock").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::LockHeld { name }) if name == "write.lock"
        ));
    }

    #[test]
    fn contention_across_registries_fails_through_the_os_lock() {
        let dir = tempdir().unwrap();
        let a = LockFactory::new(LockRegistry::new());
        let b = LockFactory::new(LockRegistry::new());

        let held = a.obtain(dir.path(), "write.lock").unwrap();

        let err = b.obtain(dir.path(), "write.lock").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::LockHeld { .. })
        ));

        held.close().unwrap();
        let lock = b.obtain(dir.path(), "write.lock").unwrap();
        lock.close().unwrap();
    }

    #[test]
    fn distinct_names_do_not_contend() {
        let dir = tempdir().unwrap();
        let factory = LockFactory::default();

        let _a = factory.obtain(dir.path(), "a.lock").unwrap();
        let _b = factory.obtain(dir.path(), "b.lock").unwrap();
        assert_eq!(factory.registry().held_count(), 2);
    }

    #[test]
    fn drop_releases_the_lock() {
        let dir = tempdir().unwrap();
        let factory = LockFactory::default();

        {
            let _held = factory.obtain(dir.path(), "write.lock").unwrap();
        }

        let lock = factory.obtain(dir.path(), "write.lock").unwrap();
        lock.close().unwrap();
    }

    #[test]
    fn marker_file_persists_after_release() {
        let dir = tempdir().unwrap();
        let factory = LockFactory::default();

        let lock = factory.obtain(dir.path(), "write.lock").unwrap();
        lock.close().unwrap();

        assert!(dir.path().join("write.lock").exists());
    }
}
