//! Session lifecycle: an expiring id -> session map with per-session
//! inactivity timers and a flat-file snapshot.

pub mod extractor;
pub mod manager;
pub mod snapshot;
pub mod types;

pub use extractor::{ActiveSession, SESSION_HEADER};
pub use manager::SessionManager;
pub use snapshot::SnapshotFile;
pub use types::{Session, SessionError, SessionId, SessionMap};
