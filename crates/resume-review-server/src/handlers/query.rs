use crate::models::{Envelope, QueryRequest, NO_RESULTS_MESSAGE};
use crate::services::ReviewService;
use crate::session::ActiveSession;
use crate::utils::error::ApiError;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

pub async fn query_handler(
    State(review_service): State<Arc<ReviewService>>,
    active: ActiveSession,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    info!("Query received for session {}", active.id);

    let handle = active.session.index.as_ref().ok_or_else(|| {
        ApiError::Validation("No documents have been added yet".to_string())
    })?;

    let response = match review_service.answer(handle, &request.query).await? {
        Some(answer) => (active.header(), Json(Envelope::new(answer))).into_response(),
        None => (active.header(), NO_RESULTS_MESSAGE).into_response(),
    };

    Ok(response)
}
