//! System-wide run lock backed by a PID file.
//!
//! The PID is written to a private temporary file first and hard-linked into
//! place, so the lock file never exists without its content.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::actions::ProcessTable;
use crate::error::OrchestrateError;

/// Age after which a lock file without a readable PID counts as stale.
const UNREADABLE_GRACE: Duration = Duration::from_secs(5);

/// Held for the whole duration of a run; the PID file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    pid: u32,
}

fn lock_io(path: &Path, source: std::io::Error) -> OrchestrateError {
    OrchestrateError::LockIo {
        path: path.to_path_buf(),
        source,
    }
}

/// PID recorded in the lock file, if the file exists and holds one.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn holder(path: &Path) -> Result<Option<u32>, OrchestrateError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().parse().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(lock_io(path, e)),
    }
}

/// PID of the live process holding the lock at `path`, if any.
///
/// # Errors
///
/// Returns an error if the lock file cannot be read.
pub fn live_holder(path: &Path, processes: &dyn ProcessTable) -> Result<Option<u32>, OrchestrateError> {
    Ok(holder(path)?.filter(|pid| processes.is_alive(*pid)))
}

/// Remove the lock at `path` if it names `pid`. Used by the interrupt
/// handler, where the [`RunLock`] guard never gets dropped.
pub fn release_if_owned(path: &Path, pid: u32) {
    if holder(path).ok().flatten() == Some(pid) {
        let _ = std::fs::remove_file(path);
    }
}

/// Whether a lock file with no readable PID was modified recently.
fn recently_modified(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < UNREADABLE_GRACE)
}

impl RunLock {
    /// Take the lock at `path` for the current process.
    ///
    /// A lock file naming a dead process is stale and is replaced. So is one
    /// without a readable PID, once it is older than a few seconds.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrateError::Locked`] if a live process holds the lock,
    /// [`OrchestrateError::LockBusy`] if a fresh lock file has no PID, or
    /// [`OrchestrateError::LockIo`] if the file cannot be written.
    pub fn acquire(path: &Path, processes: &dyn ProcessTable) -> Result<Self, OrchestrateError> {
        Self::acquire_as(path, std::process::id(), processes)
    }

    fn acquire_as(path: &Path, pid: u32, processes: &dyn ProcessTable) -> Result<Self, OrchestrateError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| lock_io(parent, e))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "lock".into(), |n| n.to_string_lossy());
        let staged = parent.join(format!(".{file_name}.{pid}"));
        std::fs::write(&staged, pid.to_string()).map_err(|e| lock_io(&staged, e))?;

        let taken = Self::link_into_place(&staged, path, processes);
        let _ = std::fs::remove_file(&staged);
        taken?;
        Ok(Self {
            path: path.to_path_buf(),
            pid,
        })
    }

    fn link_into_place(
        staged: &Path,
        path: &Path,
        processes: &dyn ProcessTable,
    ) -> Result<(), OrchestrateError> {
        for _ in 0..2 {
            match std::fs::hard_link(staged, path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    match holder(path)? {
                        Some(pid) if processes.is_alive(pid) => {
                            return Err(OrchestrateError::Locked(pid));
                        }
                        None if recently_modified(path) => {
                            return Err(OrchestrateError::LockBusy(path.to_path_buf()));
                        }
                        _ => {}
                    }
                    tracing::debug!("removing stale lock {}", path.display());
                    match std::fs::remove_file(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(lock_io(path, e)),
                    }
                }
                Err(e) => return Err(lock_io(path, e)),
            }
        }
        match holder(path)? {
            Some(pid) => Err(OrchestrateError::Locked(pid)),
            None => Err(OrchestrateError::LockBusy(path.to_path_buf())),
        }
    }

    /// Path of the PID file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        release_if_owned(&self.path, self.pid);
    }
}
