use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Max request body in bytes (uploads)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Sliding inactivity window before a session is dropped
    pub timeout_seconds: u64,
    pub snapshot_path: PathBuf,
    /// Arm a fresh window for every session restored from the snapshot
    pub rearm_on_startup: bool,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 600,
            snapshot_path: PathBuf::from("data/sessions.json"),
            rearm_on_startup: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    /// Path appended to base_url, e.g. "/embedding" (llama.cpp) or "/embeddings" (OpenAI)
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Expected vector length, 0 skips the check
    pub dimension: usize,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            endpoint: "/embedding".to_string(),
            model: "sentence-transformers/all-mpnet-base-v2".to_string(),
            api_key: None,
            dimension: 768,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            timeout_seconds: 120,
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RagConfig {
    pub retrieval_top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Directory holding every persisted vector collection
    pub index_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 4,
            chunk_size: 1000,
            chunk_overlap: 100,
            index_dir: PathBuf::from("data/index"),
        }
    }
}

pub const DEFAULT_REVIEW_PROMPT: &str = r#"
You are a resume review agent. You have been asked to review
the following resume and make suggestions for improvement, if any,
based on the job description below.

If any issues are spotted, that can be easily corrected by you,
offer a correction as well. This is applicable to spelling, grammar,
and formatting.

Feel free to peruse everything and be critical, but friendly.
This is the resume in question for context:

{context}

---

This is the role and/or job description in question. Use the context
above to give your unbiased opinion: {question}
"#;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PromptsConfig {
    /// Template with `{context}` and `{question}` placeholders
    pub review_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            review_prompt: DEFAULT_REVIEW_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Rolling log file directory, None disables file output
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from("logs")),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
