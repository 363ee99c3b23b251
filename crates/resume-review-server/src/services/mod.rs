pub mod embedding_service;
pub mod llm_service;
pub mod review_service;

pub use embedding_service::{EmbeddingProvider, EmbeddingService};
pub use llm_service::{LlmService, TextGenerator};
pub use review_service::{ReviewAnswer, ReviewService};

#[cfg(test)]
pub use embedding_service::MockEmbeddingProvider;
#[cfg(test)]
pub use llm_service::MockTextGenerator;
