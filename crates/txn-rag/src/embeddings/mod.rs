//! Text embedding backends
//!
//! Every backend implements [`Embedder`]. The service never talks to a backend
//! directly: it goes through [`SharedEmbedder`], which owns input validation,
//! deterministic truncation, batching, dimension checks and, for backends that
//! cannot run concurrently, serialization of calls.

pub mod hash;
pub mod ollama;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod shared;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{Error, Result};

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use shared::SharedEmbedder;

/// Trait for generating text embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, same order as the input
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Dimensionality of every produced vector
    fn dimensions(&self) -> usize;

    /// Whether calls may overlap. Backends returning `false` are
    /// serialized by [`SharedEmbedder`].
    fn concurrent_safe(&self) -> bool {
        true
    }

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Build the configured backend wrapped in a [`SharedEmbedder`]
pub async fn from_config(config: &EmbeddingConfig) -> Result<SharedEmbedder> {
    let backend: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.dimensions)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        #[cfg(feature = "onnx")]
        EmbeddingBackend::Onnx => Arc::new(OnnxEmbedder::new(config).await?),
        #[cfg(not(feature = "onnx"))]
        EmbeddingBackend::Onnx => {
            return Err(Error::Config(
                "embeddings.backend = \"onnx\" requires building with the `onnx` feature".into(),
            ))
        }
    };

    if backend.dimensions() != config.dimensions {
        return Err(Error::Config(format!(
            "{} produces {} dimensions but embeddings.dimensions = {}",
            backend.name(),
            backend.dimensions(),
            config.dimensions
        )));
    }

    tracing::info!(
        "Embedding backend: {} ({} dimensions, concurrent: {})",
        backend.name(),
        backend.dimensions(),
        backend.concurrent_safe()
    );

    Ok(SharedEmbedder::new(
        backend,
        config.batch_size,
        config.max_input_chars,
    ))
}

/// Squared Euclidean distance between two vectors of equal length
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
