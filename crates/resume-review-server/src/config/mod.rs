pub mod settings;

pub use settings::{
    EmbeddingConfig, LlmConfig, LoggingConfig, PromptsConfig, RagConfig, ServerConfig,
    SessionConfig, Settings,
};
