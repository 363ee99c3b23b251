use super::types::{SessionError, SessionMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Flat-file image of the whole session map.
///
/// Written in full after every mutation. There is no atomic replace: a crash
/// mid-write can leave a truncated file, which [`SnapshotFile::load`] treats
/// as empty. IO is synchronous; the file is small and every call already
/// happens under the session lock.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read. `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<SessionMap>, SessionError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(SessionError::CorruptState("snapshot file is empty".to_string()));
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SessionError::CorruptState(e.to_string()))
    }

    /// Tolerant read used at startup: any failure yields an empty map.
    pub fn load(&self) -> SessionMap {
        match self.read() {
            Ok(Some(sessions)) => {
                debug!("Loaded {} sessions from {:?}", sessions.len(), self.path);
                sessions
            }
            Ok(None) => {
                debug!("No session snapshot at {:?}, starting empty", self.path);
                SessionMap::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable session snapshot {:?}: {}", self.path, e);
                SessionMap::new()
            }
        }
    }

    /// Overwrite the snapshot with the full map.
    pub fn save(&self, sessions: &SessionMap) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(sessions)
            .map_err(|e| SessionError::CorruptState(e.to_string()))?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}
