//! Request-scoped temporary files.
//!
//! pdfium opens documents from a file-system path, so an uploaded PDF has to
//! be staged on disk for the duration of one request. Three pieces keep that
//! staging leak-free:
//!
//! * [`TempFileManager`] hands out uniquely named files in one directory.
//!   Names come from [`tempfile::Builder`], which combines a random suffix with
//!   exclusive creation, so two concurrent requests can never share a path.
//! * [`TempResource`] is one allocated file and its lifecycle state.
//! * [`TempScope`] owns every resource of one request and releases whatever
//!   is still live when it is dropped: on success, on an early `?` return and
//!   while unwinding from a panic.
//!
//! Removal is best-effort. A file that cannot be removed (already gone,
//! permission denied) is reported with `warn!` and otherwise ignored; a leaked
//! temp file is unwanted but never fails the request.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const PREFIX: &str = "reportrx-";

/// Lifecycle of a [`TempResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempState {
    Created,
    InUse,
    Released,
}

/// Allocates uniquely named temporary files inside one directory.
#[derive(Debug, Clone)]
pub struct TempFileManager {
    dir: PathBuf,
}

impl TempFileManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Manager rooted at the OS temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new empty file ending in `suffix` (e.g. `".pdf"`).
    pub fn allocate(&self, suffix: &str) -> io::Result<TempResource> {
        let file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.dir)?;
        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        debug!("Allocated temp file {}", path.display());
        Ok(TempResource {
            path,
            inner: Some(temp_path),
            state: TempState::Created,
        })
    }

    /// Remove `resource` from disk. Failures are logged, never returned.
    pub fn release(&self, resource: TempResource) {
        resource.release();
    }

    /// Paths of files in this manager's directory that carry our prefix.
    ///
    /// Used by tests and diagnostics to detect leaked files.
    pub fn leftovers(&self) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(PREFIX) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

impl Default for TempFileManager {
    fn default() -> Self {
        Self::system()
    }
}

/// One temporary file. Removed on [`TempResource::release`] or on drop.
#[derive(Debug)]
pub struct TempResource {
    path: PathBuf,
    inner: Option<TempPath>,
    state: TempState,
}

impl TempResource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> TempState {
        self.state
    }

    /// Replace the file contents with `bytes` and mark the resource in use.
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(&self.path, bytes)?;
        self.state = TempState::InUse;
        Ok(())
    }

    /// Remove the file now.
    pub fn release(mut self) {
        self.release_in_place();
    }

    fn release_in_place(&mut self) {
        let Some(temp_path) = self.inner.take() else {
            return;
        };
        match temp_path.close() {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) => warn!(
                "Could not remove temporary file {}: {}",
                self.path.display(),
                e
            ),
        }
        self.state = TempState::Released;
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

/// Every temporary file allocated while serving one request.
#[derive(Debug)]
pub struct TempScope {
    manager: TempFileManager,
    live: Vec<TempResource>,
    allocated: usize,
}

impl TempScope {
    pub fn new(manager: TempFileManager) -> Self {
        Self {
            manager,
            live: Vec::new(),
            allocated: 0,
        }
    }

    /// Allocate a file owned by this scope and return its path.
    pub fn allocate(&mut self, suffix: &str) -> io::Result<PathBuf> {
        let resource = self.manager.allocate(suffix)?;
        let path = resource.path().to_path_buf();
        self.live.push(resource);
        self.allocated += 1;
        Ok(path)
    }

    /// Write `bytes` into a file previously allocated by this scope.
    pub fn write(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        match self.live.iter_mut().find(|r| r.path() == path) {
            Some(resource) => resource.write_all(bytes),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a live temp file of this scope", path.display()),
            )),
        }
    }

    /// Release one file ahead of the scope's end. Returns `false` if `path`
    /// was not live in this scope.
    pub fn release(&mut self, path: &Path) -> bool {
        match self.live.iter().position(|r| r.path() == path) {
            Some(i) => {
                self.live.swap_remove(i).release();
                true
            }
            None => false,
        }
    }

    /// Release every live file; returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        for resource in self.live.drain(..) {
            resource.release();
        }
        if count > 0 {
            debug!("Released {} temp file(s)", count);
        }
        count
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total allocations over the scope's lifetime.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_creates_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        let a = manager.allocate(".pdf").unwrap();
        let b = manager.allocate(".pdf").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().exists() && b.path().exists());
        assert!(a.path().to_string_lossy().ends_with(".pdf"));
        assert_eq!(a.state(), TempState::Created);
        assert_eq!(manager.leftovers().unwrap().len(), 2);
    }

    #[test]
    fn write_marks_in_use_and_release_removes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        let mut res = manager.allocate(".bin").unwrap();
        res.write_all(b"%PDF-1.7").unwrap();
        assert_eq!(res.state(), TempState::InUse);
        let path = res.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");

        manager.release(res);
        assert!(!path.exists());
    }

    #[test]
    fn release_of_already_removed_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        let res = manager.allocate(".png").unwrap();
        std::fs::remove_file(res.path()).unwrap();
        res.release();
        assert!(manager.leftovers().unwrap().is_empty());
    }

    #[test]
    fn dropping_unreleased_resource_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        let path = {
            let res = manager.allocate(".tmp").unwrap();
            res.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn scope_releases_everything_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        {
            let mut scope = TempScope::new(manager.clone());
            let p = scope.allocate(".pdf").unwrap();
            scope.write(&p, b"data").unwrap();
            scope.allocate(".png").unwrap();
            assert_eq!(scope.live_count(), 2);
            assert_eq!(manager.leftovers().unwrap().len(), 2);
        }
        assert!(manager.leftovers().unwrap().is_empty());
    }

    #[test]
    fn scope_early_release() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = TempScope::new(TempFileManager::new(dir.path()));
        let p = scope.allocate(".pdf").unwrap();
        assert!(scope.release(&p));
        assert!(!p.exists());
        assert!(!scope.release(&p), "second release is a no-op");
        assert_eq!(scope.live_count(), 0);
        assert_eq!(scope.allocated(), 1);
    }

    #[test]
    fn scope_write_to_unknown_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut scope = TempScope::new(TempFileManager::new(dir.path()));
        let err = scope
            .write(&dir.path().join("elsewhere.pdf"), b"x")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn scope_releases_while_unwinding() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempFileManager::new(dir.path());
        let m = manager.clone();
        let result = std::panic::catch_unwind(move || {
            let mut scope = TempScope::new(m);
            scope.allocate(".pdf").unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(manager.leftovers().unwrap().is_empty());
    }
}
