use super::manager::SessionManager;
use super::types::{Session, SessionId};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;

/// Header carrying the session id in both directions.
pub const SESSION_HEADER: &str = "x-session-id";

/// The caller's session, resolved (or freshly created) before the handler
/// runs. Resolving refreshes the session and restarts its expiry timer.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: SessionId,
    pub session: Session,
}

impl ActiveSession {
    /// Response header echoing the id back so clients can reuse it.
    pub fn header(&self) -> [(&'static str, String); 1] {
        [(SESSION_HEADER, self.id.clone())]
    }
}

impl<S> FromRequestParts<S> for ActiveSession
where
    SessionManager: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = SessionManager::from_ref(state);

        let requested = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let (id, session) = manager.resolve(requested.as_deref()).await;
        Ok(Self { id, session })
    }
}
