use crate::index::{DocumentIndex, IndexError};
use crate::models::{Envelope, UploadResponse};
use crate::session::{ActiveSession, SessionManager};
use crate::utils::error::ApiError;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn upload_handler(
    State(sessions): State<SessionManager>,
    State(index): State<Arc<dyn DocumentIndex>>,
    active: ActiveSession,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    info!("Upload started for session {}", active.id);

    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // Only the final path component; clients may send full paths.
        let filename = field
            .file_name()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("filename required".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;

        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("file required".to_string()))?;

    let temp_path = std::env::temp_dir().join(format!("temp_{}_{}", active.id, filename));
    tokio::fs::write(&temp_path, &data)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to write temp file: {}", e)))?;

    let indexed = index.embed_and_index(&active.id, &temp_path, &filename).await;

    if let Err(e) = tokio::fs::remove_file(&temp_path).await {
        warn!("Failed to remove temp file {:?}: {}", temp_path, e);
    }

    let handle = indexed.map_err(|e| match e {
        IndexError::EmptyDocument(msg) => ApiError::Validation(msg),
        other => {
            error!("Error creating vector store: {:#}", other);
            ApiError::InternalError(format!("Error creating vector store: {}", other))
        }
    })?;

    if let Err(e) = sessions.attach_index(&active.id, handle.clone()).await {
        // Session expired mid-upload; the new collection has no owner.
        warn!("Session {} gone before attach: {}", active.id, e);
        if let Err(drop_err) = index.drop_collection(&handle).await {
            warn!("Failed to drop orphaned collection {}: {}", handle.collection, drop_err);
        }
        return Err(e.into());
    }
    info!("Vector store attached to session {}", active.id);

    let body = Envelope::new(UploadResponse {
        message: format!("Database {} created", filename),
        session_id: active.id.clone(),
    });

    Ok((StatusCode::CREATED, active.header(), Json(body)))
}
