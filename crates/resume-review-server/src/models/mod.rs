pub mod review;

pub use review::{Envelope, QueryRequest, UploadResponse, NO_RESULTS_MESSAGE};
