use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{BackdropError, Result};

/// Replace `path` with `bytes` so that readers see either the old file or the
/// new one, never a truncated mix.
///
/// Writes to a temp file in the same directory (same filesystem, so the
/// final rename is atomic), fsyncs it, then renames over the target. On any
/// error the temp file is removed and the target is left as it was.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| BackdropError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".backdrop-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| BackdropError::io(dir, e))?;

    tmp.write_all(bytes)
        .map_err(|e| BackdropError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| BackdropError::io(tmp.path(), e))?;

    // Temp files are created 0600; the artifact is served by other processes.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| BackdropError::io(tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| BackdropError::io(path, e.error))?;
    debug!(path = %path.display(), bytes = bytes.len(), "file replaced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a/b/c.bin");
        atomic_write(&target, b"hello").expect("write");
        assert_eq!(std::fs::read(&target).expect("read"), b"hello");
    }

    #[test]
    fn replaces_existing_content_fully() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("f.txt");
        std::fs::write(&target, b"a much longer original body").expect("seed");
        atomic_write(&target, b"short").expect("write");
        assert_eq!(std::fs::read(&target).expect("read"), b"short");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("f.txt");
        atomic_write(&target, b"one").expect("write");
        atomic_write(&target, b"two").expect("write");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("f.txt")]);
    }

    #[test]
    fn failed_write_keeps_original() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Target is a directory: the final rename must fail.
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("keep"), b"x").expect("seed");

        let err = atomic_write(&target, b"new").unwrap_err();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(target.join("keep").exists());
    }
}
