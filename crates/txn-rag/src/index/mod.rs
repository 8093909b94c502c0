//! Exact nearest-neighbour index over corpus embeddings

pub mod flat;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use flat::FlatIndex;

/// One search hit: squared Euclidean distance and corpus position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub distance: f32,
    pub position: usize,
}

/// Read-only k-nearest-neighbour search
pub trait VectorIndex: Send + Sync {
    /// The `k` nearest vectors to `query`, nearest first, ties by position.
    /// `k` larger than the index is clamped.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality every vector and query must have
    fn dimensions(&self) -> usize;

    /// Index name for logging
    fn name(&self) -> &str;
}
