use std::path::{Path, PathBuf};

pub struct RuntimePaths {
    pub runtime_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
}

const APP_ID: &str = "keeper";

pub fn runtime_paths() -> RuntimePaths {
    if let Some(dir) = std::env::var_os("KEEPER_RUNTIME_DIR") {
        return mk(PathBuf::from(dir));
    }

    // Linux: prefer XDG_RUNTIME_DIR if present.
    if let Some(xdg) = std::env::var_os("XDG_RUNTIME_DIR") {
        let dir = PathBuf::from(xdg).join(APP_ID);
        return mk(dir);
    }

    // macOS: use TMPDIR. (Also fine as Linux fallback.)
    if let Some(tmp) = std::env::var_os("TMPDIR") {
        let dir = PathBuf::from(tmp).join(APP_ID);
        return mk(dir);
    }

    mk(std::env::temp_dir().join(APP_ID))
}

fn mk(runtime_dir: PathBuf) -> RuntimePaths {
    RuntimePaths {
        socket_path: runtime_dir.join("keeperd.sock"),
        lock_path: runtime_dir.join("keeperd.lock"),
        runtime_dir,
    }
}

pub fn ensure_dir(p: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(p)
}

/// Size of a file in MiB rounded to two decimals, the unit backups are reported in.
pub fn mebibytes(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}
