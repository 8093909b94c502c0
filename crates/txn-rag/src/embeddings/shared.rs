//! Shared embedder used by ingestion and every concurrent query

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Embedder;
use crate::error::{Error, Result};

/// Wraps a backend with the invariants every embedding call must satisfy:
///
/// - blank input is rejected, never embedded as a zero vector
/// - input longer than `max_input_chars` is cut to its first `max_input_chars` characters
/// - every vector has exactly `dimensions()` finite components
/// - backends that are not `concurrent_safe` run one call at a time
#[derive(Clone)]
pub struct SharedEmbedder {
    inner: Arc<dyn Embedder>,
    /// Present only for backends that cannot run concurrently
    gate: Option<Arc<Mutex<()>>>,
    batch_size: usize,
    max_input_chars: usize,
}

impl SharedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, batch_size: usize, max_input_chars: usize) -> Self {
        let gate = if inner.concurrent_safe() {
            None
        } else {
            Some(Arc::new(Mutex::new(())))
        };

        Self {
            inner,
            gate,
            batch_size: batch_size.max(1),
            max_input_chars: max_input_chars.max(1),
        }
    }

    /// Whether calls into the backend are serialized
    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    /// Validate and truncate one input
    pub fn prepare<'t>(&self, text: &'t str) -> Result<&'t str> {
        let truncated = truncate_chars(text, self.max_input_chars);
        if truncated.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }
        if truncated.len() < text.len() {
            tracing::debug!(
                "Truncated embedding input from {} to {} characters",
                text.chars().count(),
                self.max_input_chars
            );
        }
        Ok(truncated)
    }

    fn check(&self, vector: &[f32]) -> Result<()> {
        let expected = self.inner.dimensions();
        if vector.len() != expected {
            return Err(Error::embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.inner.name(),
                vector.len(),
                expected
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::embedding(format!(
                "{} returned a non-finite component",
                self.inner.name()
            )));
        }
        Ok(())
    }
}

/// Keep the first `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[async_trait]
impl Embedder for SharedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = self.prepare(text)?;

        let vector = match &self.gate {
            Some(gate) => {
                let _guard = gate.lock().await;
                self.inner.embed(input).await?
            }
            None => self.inner.embed(input).await?,
        };

        self.check(&vector)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs = texts
            .iter()
            .map(|t| self.prepare(t).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let mut embeddings = Vec::with_capacity(inputs.len());

        for (batch_number, batch) in inputs.chunks(self.batch_size).enumerate() {
            let vectors = match &self.gate {
                Some(gate) => {
                    let _guard = gate.lock().await;
                    self.inner.embed_batch(batch).await?
                }
                None => self.inner.embed_batch(batch).await?,
            };

            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for a batch of {}",
                    self.inner.name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in &vectors {
                self.check(vector)?;
            }

            embeddings.extend(vectors);
            tracing::debug!(
                "Embedded batch {} ({} of {} texts)",
                batch_number + 1,
                embeddings.len(),
                inputs.len()
            );
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
