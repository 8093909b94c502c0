//! Configuration for the transaction RAG service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the data file path
pub const DATA_PATH_ENV: &str = "TXN_RAG_DATA";
/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "PORT";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Tabular data source
    pub data: DataConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Retrieval and context configuration
    pub retrieval: RetrievalConfig,
    /// Completion service configuration
    pub llm: LlmConfig,
    /// Admission control for concurrent queries
    pub admission: AdmissionConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply environment overrides (`TXN_RAG_DATA`, `PORT`)
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var(DATA_PATH_ENV) {
            self.data.path = PathBuf::from(path);
        }

        if let Ok(port) = std::env::var(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid {}={}: {}", PORT_ENV, port, e)))?;
        }

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".into()));
        }
        if self.embeddings.max_input_chars == 0 {
            return Err(Error::Config("embeddings.max_input_chars must be > 0".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be > 0".into()));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(Error::Config("retrieval.max_context_chars must be > 0".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::Config("llm.timeout_secs must be > 0".into()));
        }
        if self.admission.max_concurrent == 0 {
            return Err(Error::Config("admission.max_concurrent must be > 0".into()));
        }
        if !self.data.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "data.delimiter must be a single ASCII character, got {:?}",
                self.data.delimiter
            )));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// Tabular data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Path to the delimited transactions file
    pub path: PathBuf,
    /// Column delimiter (tab by default)
    pub delimiter: char,
    /// Whether the first row is a header row
    pub has_headers: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("jordan_transactions.csv"),
            delimiter: '\t',
            has_headers: false,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama embedding endpoint
    #[default]
    Ollama,
    /// Local feature-hashing embedder (no model download)
    Hash,
    /// Local ONNX sentence-transformer (requires the `onnx` feature)
    Onnx,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend producing the vectors
    pub backend: EmbeddingBackend,
    /// Model name (backend specific)
    pub model: String,
    /// Embedding dimensions, fixed for the process lifetime
    pub dimensions: usize,
    /// Batch size for bulk ingestion
    pub batch_size: usize,
    /// Inputs longer than this many characters are truncated, keeping the head
    pub max_input_chars: usize,
    /// Base URL for the Ollama backend
    pub base_url: String,
    /// Request timeout for remote embedding backends
    pub timeout_secs: u64,
    /// Cache directory for ONNX models
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            max_input_chars: 2048,
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("txn-rag")
                .join("models"),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of records retrieved per question
    pub top_k: usize,
    /// Context budget in characters, separators included
    pub max_context_chars: usize,
    /// Longest accepted question in characters
    pub max_question_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 4000,
            max_question_chars: 2000,
        }
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL (chat-completions compatible)
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
    /// Timeout for one completion attempt in seconds
    pub timeout_secs: u64,
    /// Retries for transient failures (timeout, rate limit, 5xx)
    pub max_retries: u32,
    /// Initial backoff between retries in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: None,
            timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Admission control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Queries processed at the same time
    pub max_concurrent: usize,
    /// Queries allowed to wait for a slot; more are rejected as busy
    pub max_queued: usize,
    /// Longest wait for a slot in milliseconds
    pub queue_timeout_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get().clamp(2, 16),
            max_queued: 64,
            queue_timeout_ms: 10_000,
        }
    }
}
