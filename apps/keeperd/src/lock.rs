use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

/// Held for the daemon's lifetime; dropping the file releases the lock.
pub struct LockGuard {
    _file: File,
}

/// Takes the single-instance lock and records our pid in it. A second daemon gets
/// `ErrorKind::WouldBlock`.
pub fn acquire_lock(path: &Path) -> std::io::Result<LockGuard> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;

    file.try_lock_exclusive()?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(LockGuard { _file: file })
}
