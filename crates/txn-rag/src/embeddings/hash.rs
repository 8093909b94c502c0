//! Local feature-hashing embedder
//!
//! Hashes character trigrams and whole words of the lowercased text into a
//! fixed number of buckets, then L2-normalises. No model, no network, and the
//! same text always maps to the same vector.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::Embedder;
use crate::error::{Error, Result};

/// Weight of a whole-word hit relative to a trigram hit
const WORD_WEIGHT: f32 = 2.0;

/// Deterministic bag-of-ngrams embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }

        let mut vector = vec![0.0f32; self.dimensions];
        let normalized = text.to_lowercase();

        let chars: Vec<char> = normalized.chars().collect();
        for window in chars.windows(3) {
            vector[self.bucket(window)] += 1.0;
        }

        for word in normalized.split_whitespace() {
            vector[self.bucket(word)] += WORD_WEIGHT;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }

        Ok(vector)
    }

    fn bucket<T: Hash + ?Sized>(&self, item: &T) -> usize {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_text(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}
