use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use backdrop_core::{BackdropError, Result};
use tracing::{debug, warn};

/// Advisory cross-process lock around a run cycle.
///
/// The lock file is created with `create_new`, so only one process can hold
/// it; it is removed on drop. A lock file older than `stale_after` is assumed
/// to belong to a crashed process and is taken over once.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// `Ok(None)` when another live cycle holds the lock.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| BackdropError::io(parent, e))?;
            }
        }

        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Holder pid, for humans inspecting a stuck lock.
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        warn!(path = %path.display(), error = %e, "failed to record run lock holder");
                    }
                    debug!(path = %path.display(), "run lock acquired");
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == 0 && is_stale(path, stale_after) {
                        warn!(path = %path.display(), "removing stale run lock");
                        match std::fs::remove_file(path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(BackdropError::io(path, e)),
                        }
                    }
                    return Ok(None);
                }
                Err(e) => return Err(BackdropError::io(path, e)),
            }
        }
        Ok(None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age > stale_after)
}
