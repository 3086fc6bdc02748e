//! XDG path utilities for booruvault.

use std::path::PathBuf;

/// Get the socket path for IPC communication.
///
/// Returns `$XDG_RUNTIME_DIR/booruvault/booruvault.sock` or falls back to
/// `/tmp/booruvault-$UID/booruvault.sock`.
pub fn socket_path() -> PathBuf {
    if let Some(runtime_dir) = dirs::runtime_dir() {
        runtime_dir.join("booruvault").join("booruvault.sock")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/booruvault-{}/booruvault.sock", uid))
    }
}

/// Get the database path.
///
/// Returns `$XDG_DATA_HOME/booruvault/cache.db` or falls back to
/// `~/.local/share/booruvault/cache.db`.
pub fn database_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local/share")
    });
    data_dir.join("booruvault").join("cache.db")
}

/// Get the configuration file path.
///
/// Returns `$XDG_CONFIG_HOME/booruvault/config.toml` or falls back to
/// `~/.config/booruvault/config.toml`.
pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".config")
    });
    config_dir.join("booruvault").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_valid() {
        let socket = socket_path();
        assert!(socket.to_str().unwrap().contains("booruvault"));
        assert!(socket.to_str().unwrap().ends_with("booruvault.sock"));

        let db = database_path();
        assert!(db.to_str().unwrap().contains("booruvault"));
        assert!(db.to_str().unwrap().ends_with("cache.db"));

        let config = config_path();
        assert!(config.to_str().unwrap().contains("booruvault"));
        assert!(config.to_str().unwrap().ends_with("config.toml"));
    }
}
