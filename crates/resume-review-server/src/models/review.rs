use serde::{Deserialize, Serialize};

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

// ===== RESPONSE MODELS =====

/// Every JSON success body is wrapped as `{"response": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub response: T,
}

impl<T> Envelope<T> {
    pub fn new(response: T) -> Self {
        Self { response }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub session_id: String,
}

pub const NO_RESULTS_MESSAGE: &str = "Unable to find matching results";
