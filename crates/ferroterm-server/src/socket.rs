//! Socket path resolution and listener setup.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::error::ServerError;

/// Name used for the socket file.
pub const APP_NAME: &str = "ferroterm";

/// Resolve the socket path from an environment lookup.
///
/// `${RUNTIME_DIR}/ferroterm-${DISPLAY}.sock`, or `ferroterm.sock` in the
/// runtime directory when `DISPLAY` is unset; `/tmp/ferroterm.sock` without a
/// runtime directory.
pub fn socket_path_from<F>(env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());
    match non_empty("RUNTIME_DIR") {
        Some(dir) => {
            let file = match non_empty("DISPLAY") {
                Some(display) => format!("{APP_NAME}-{}.sock", display.replace('/', "_")),
                None => format!("{APP_NAME}.sock"),
            };
            Path::new(&dir).join(file)
        }
        None => PathBuf::from(format!("/tmp/{APP_NAME}.sock")),
    }
}

/// Resolve the socket path from the process environment.
#[must_use]
pub fn socket_path() -> PathBuf {
    socket_path_from(|key| std::env::var(key).ok())
}

/// Bind the server socket at `path`.
///
/// A path that accepts connections belongs to a running server and is left
/// alone. Anything else at the path is a stale socket and is replaced.
pub fn bind_listener(path: &Path) -> Result<UnixListener, ServerError> {
    match UnixListener::bind(path) {
        Ok(listener) => return Ok(listener),
        Err(err) if err.kind() != io::ErrorKind::AddrInUse => return Err(err.into()),
        Err(_) => {}
    }
    if UnixStream::connect(path).is_ok() {
        return Err(ServerError::SocketInUse(path.to_path_buf()));
    }
    tracing::info!(path = %path.display(), "removing stale socket");
    std::fs::remove_file(path)?;
    Ok(UnixListener::bind(path)?)
}

/// Removes the socket file when dropped.
#[derive(Debug)]
pub struct SocketGuard {
    path: PathBuf,
}

impl SocketGuard {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path)
            && err.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), %err, "failed to remove socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ferroterm-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    // ── Path resolution ─────────────────────────────────────────────

    #[test]
    fn runtime_dir_and_display() {
        let path = socket_path_from(env_of(&[("RUNTIME_DIR", "/run/user/1000"), ("DISPLAY", "wayland-1")]));
        assert_eq!(path, PathBuf::from("/run/user/1000/ferroterm-wayland-1.sock"));
    }

    #[test]
    fn runtime_dir_without_display() {
        let path = socket_path_from(env_of(&[("RUNTIME_DIR", "/run/user/1000")]));
        assert_eq!(path, PathBuf::from("/run/user/1000/ferroterm.sock"));
    }

    #[test]
    fn no_runtime_dir_falls_back_to_tmp() {
        let path = socket_path_from(env_of(&[("DISPLAY", ":0")]));
        assert_eq!(path, PathBuf::from("/tmp/ferroterm.sock"));
    }

    #[test]
    fn empty_runtime_dir_counts_as_unset() {
        let path = socket_path_from(env_of(&[("RUNTIME_DIR", "")]));
        assert_eq!(path, PathBuf::from("/tmp/ferroterm.sock"));
    }

    #[test]
    fn display_with_slash_stays_in_directory() {
        let path = socket_path_from(env_of(&[("RUNTIME_DIR", "/r"), ("DISPLAY", "a/b")]));
        assert_eq!(path, PathBuf::from("/r/ferroterm-a_b.sock"));
    }

    // ── Binding ─────────────────────────────────────────────────────

    #[test]
    fn live_socket_is_refused() {
        let dir = scratch_dir("live");
        let path = dir.join("s.sock");
        let _first = bind_listener(&path).expect("first bind");
        assert!(matches!(
            bind_listener(&path),
            Err(ServerError::SocketInUse(p)) if p == path
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_socket_is_replaced() {
        let dir = scratch_dir("stale");
        let path = dir.join("s.sock");
        drop(UnixListener::bind(&path).expect("bind"));
        assert!(path.exists());
        let listener = bind_listener(&path).expect("rebind over stale socket");
        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn guard_unlinks_on_drop() {
        let dir = scratch_dir("guard");
        let path = dir.join("s.sock");
        let _listener = bind_listener(&path).expect("bind");
        drop(SocketGuard::new(path.clone()));
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
