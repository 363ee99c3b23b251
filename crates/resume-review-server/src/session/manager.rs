use super::snapshot::SnapshotFile;
use super::types::{Session, SessionError, SessionId, SessionMap};
use crate::config::SessionConfig;
use crate::index::{DocumentIndex, IndexHandle};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pending expiry callback for one session.
struct ExpiryTimer {
    /// Must still match the table entry when the timer fires, otherwise the
    /// session was re-armed in the meantime and the firing is stale.
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SessionTables {
    sessions: SessionMap,
    timers: HashMap<SessionId, ExpiryTimer>,
    next_generation: u64,
}

struct Inner {
    tables: Mutex<SessionTables>,
    snapshot: SnapshotFile,
    timeout: Duration,
    /// Owner of the vector collections; a session's collection is dropped
    /// when the session is removed or expires.
    collections: Option<Arc<dyn DocumentIndex>>,
}

/// Process-wide session registry.
///
/// Owns both the session map and the timer table behind a single async
/// mutex, so request handlers and expiry callbacks are serialized against
/// each other. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Empty manager; nothing is read from `snapshot`.
    pub fn new(snapshot: SnapshotFile, timeout: Duration) -> Self {
        Self::build(snapshot, timeout, SessionMap::new(), None)
    }

    /// Like [`SessionManager::new`], but sessions leaving the registry take
    /// their collection in `collections` with them.
    pub fn with_collections(
        snapshot: SnapshotFile,
        timeout: Duration,
        collections: Arc<dyn DocumentIndex>,
    ) -> Self {
        Self::build(snapshot, timeout, SessionMap::new(), Some(collections))
    }

    fn build(
        snapshot: SnapshotFile,
        timeout: Duration,
        sessions: SessionMap,
        collections: Option<Arc<dyn DocumentIndex>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(SessionTables {
                    sessions,
                    ..Default::default()
                }),
                snapshot,
                timeout,
                collections,
            }),
        }
    }

    /// Restore from the snapshot file. A missing or unreadable snapshot
    /// starts an empty registry. Must be called inside a tokio runtime when
    /// `rearm_on_startup` is set.
    pub async fn load(
        config: &SessionConfig,
        collections: Option<Arc<dyn DocumentIndex>>,
    ) -> Self {
        let snapshot = SnapshotFile::new(&config.snapshot_path);
        let sessions = snapshot.load();
        let restored = sessions.len();

        let manager = Self::build(snapshot, config.timeout(), sessions, collections);

        if config.rearm_on_startup && restored > 0 {
            let mut tables = manager.inner.tables.lock().await;
            let ids: Vec<SessionId> = tables.sessions.keys().cloned().collect();
            for id in ids {
                manager.arm(&mut tables, &id);
            }
            info!("Re-armed expiry for {} restored sessions", restored);
        } else if restored > 0 {
            info!("Restored {} sessions without expiry timers", restored);
        }

        manager
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Look up a session by id, creating a fresh one when the id is absent
    /// or unknown. Either way the session's timestamp is refreshed, the
    /// snapshot rewritten and its expiry timer restarted.
    pub async fn resolve(&self, requested: Option<&str>) -> (SessionId, Session) {
        let mut tables = self.inner.tables.lock().await;

        let known = requested
            .filter(|id| tables.sessions.contains_key(*id))
            .map(str::to_string);

        let id = match known {
            Some(id) => {
                if let Some(session) = tables.sessions.get_mut(&id) {
                    session.touch();
                }
                debug!("Resumed session {}", id);
                id
            }
            None => {
                let id = Self::mint_id(&tables.sessions);
                tables.sessions.insert(id.clone(), Session::new());
                match requested {
                    Some(stale) => info!("Unknown session {}, created {}", stale, id),
                    None => info!("Created session {}", id),
                }
                id
            }
        };

        self.persist(&tables);
        self.arm(&mut tables, &id);

        let session = tables.sessions[&id].clone();
        (id, session)
    }

    /// Attach a vector index to an existing session.
    pub async fn attach_index(&self, id: &str, handle: IndexHandle) -> Result<(), SessionError> {
        let mut tables = self.inner.tables.lock().await;

        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        debug!("Attaching collection {} to session {}", handle.collection, id);
        session.index = Some(handle);

        self.persist(&tables);
        Ok(())
    }

    /// Drop a session, its timer and its collection. Returns whether
    /// anything was removed; removing an absent id is not an error.
    pub async fn remove(&self, id: &str) -> bool {
        let mut tables = self.inner.tables.lock().await;

        if let Some(timer) = tables.timers.remove(id) {
            timer.handle.abort();
        }

        let Some(session) = tables.sessions.remove(id) else {
            return false;
        };
        self.persist(&tables);
        drop(tables);
        info!("Session {} removed", id);

        Self::release_collection(&self.inner, id, session.index).await;
        true
    }

    /// Detach every index handle, e.g. after the index storage was wiped.
    pub async fn clear_indexes(&self) -> usize {
        let mut tables = self.inner.tables.lock().await;

        let mut cleared = 0;
        for session in tables.sessions.values_mut() {
            if session.index.take().is_some() {
                cleared += 1;
            }
        }

        if cleared > 0 {
            self.persist(&tables);
        }
        cleared
    }

    /// Read a session without touching it.
    pub async fn peek(&self, id: &str) -> Option<Session> {
        self.inner.tables.lock().await.sessions.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.tables.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn has_timer(&self, id: &str) -> bool {
        self.inner.tables.lock().await.timers.contains_key(id)
    }

    /// Final save and cancellation of every pending timer.
    pub async fn shutdown(&self) {
        let mut tables = self.inner.tables.lock().await;

        self.persist(&tables);
        let cancelled = tables.timers.len();
        for (_, timer) in tables.timers.drain() {
            timer.handle.abort();
        }

        info!(
            "Session manager shut down: {} sessions saved, {} timers cancelled",
            tables.sessions.len(),
            cancelled
        );
    }

    fn mint_id(sessions: &SessionMap) -> SessionId {
        loop {
            let id = Uuid::new_v4().to_string();
            if !sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Cancel-then-restart the expiry timer for `id`.
    fn arm(&self, tables: &mut SessionTables, id: &str) {
        if let Some(previous) = tables.timers.remove(id) {
            previous.handle.abort();
        }

        tables.next_generation += 1;
        let generation = tables.next_generation;

        let weak = Arc::downgrade(&self.inner);
        let timeout = self.inner.timeout;
        let session_id = id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            Self::expire(weak, session_id, generation).await;
        });

        tables
            .timers
            .insert(id.to_string(), ExpiryTimer { generation, handle });
    }

    async fn expire(inner: Weak<Inner>, id: SessionId, generation: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut tables = inner.tables.lock().await;

        let current = tables.timers.get(&id).map(|t| t.generation);
        if current != Some(generation) {
            debug!("Stale expiry for session {} ignored", id);
            return;
        }

        tables.timers.remove(&id);
        let Some(session) = tables.sessions.remove(&id) else {
            return;
        };
        if let Err(e) = inner.snapshot.save(&tables.sessions) {
            error!("Failed to save sessions to {:?}: {}", inner.snapshot.path(), e);
        }
        drop(tables);
        info!("Session {} expired after {:?} of inactivity", id, inner.timeout);

        Self::release_collection(&inner, &id, session.index).await;
    }

    /// Runs outside the table lock.
    async fn release_collection(inner: &Inner, id: &str, handle: Option<IndexHandle>) {
        let (Some(collections), Some(handle)) = (&inner.collections, handle) else {
            return;
        };

        match collections.drop_collection(&handle).await {
            Ok(()) => debug!("Dropped collection {} of session {}", handle.collection, id),
            Err(e) => warn!(
                "Failed to drop collection {} of session {}: {}",
                handle.collection, id, e
            ),
        }
    }

    /// Best-effort full write-out; failures are logged, never surfaced.
    fn persist(&self, tables: &SessionTables) {
        if let Err(e) = self.inner.snapshot.save(&tables.sessions) {
            error!(
                "Failed to save sessions to {:?}: {}",
                self.inner.snapshot.path(),
                e
            );
        }
    }
}
