use std::io::ErrorKind;
use std::path::Path;

use tokio::net::{UnixListener, UnixStream};

/// Binds the control socket. Anyone who can connect can stop the server or restore a
/// backup, so the socket is made owner-only on Unix.
pub fn bind(path: &Path) -> std::io::Result<UnixListener> {
    let listener = UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(listener)
}

pub fn remove_stale_socket(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// A socket file with nobody accepting on it is left over from a crashed daemon.
pub async fn socket_alive(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}
