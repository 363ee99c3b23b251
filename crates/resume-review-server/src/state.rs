use axum::extract::FromRef;
use std::sync::Arc;

use crate::index::DocumentIndex;
use crate::services::ReviewService;
use crate::session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub index: Arc<dyn DocumentIndex>,
    pub review_service: Arc<ReviewService>,
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<ReviewService> {
    fn from_ref(state: &AppState) -> Self {
        state.review_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn DocumentIndex> {
    fn from_ref(state: &AppState) -> Self {
        state.index.clone()
    }
}
