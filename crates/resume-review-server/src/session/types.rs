use crate::index::IndexHandle;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type SessionId = String;

pub type SessionMap = HashMap<SessionId, Session>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Absent until a document has been uploaded
    #[serde(default)]
    pub index: Option<IndexHandle>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            index: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Refresh `last_activity`. Always moves forward, even when the wall
    /// clock has not ticked since the previous touch.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_activity = if now > self.last_activity {
            now
        } else {
            self.last_activity + Duration::microseconds(1)
        };
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Corrupt session snapshot: {0}")]
    CorruptState(String),

    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_is_strictly_increasing() {
        let mut session = Session::new();
        let mut previous = session.last_activity;

        for _ in 0..1000 {
            session.touch();
            assert!(session.last_activity > previous);
            previous = session.last_activity;
        }
    }

    #[test]
    fn test_touch_survives_clock_behind() {
        let mut session = Session::new();
        session.last_activity = Utc::now() + Duration::hours(1);
        let ahead = session.last_activity;

        session.touch();
        assert!(session.last_activity > ahead);
    }
}
