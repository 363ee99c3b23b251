use crate::index::DocumentIndex;
use crate::session::SessionManager;
use crate::utils::error::ApiError;
use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::info;

/// Wipe every persisted vector collection. Sessions keep living but lose
/// their index handles.
pub async fn delete_handler(
    State(index): State<Arc<dyn DocumentIndex>>,
    State(sessions): State<SessionManager>,
) -> Result<(StatusCode, &'static str), ApiError> {
    index.delete_storage().await?;

    let detached = sessions.clear_indexes().await;
    info!("Index storage deleted, {} sessions detached", detached);

    Ok((StatusCode::OK, "Database deleted"))
}
