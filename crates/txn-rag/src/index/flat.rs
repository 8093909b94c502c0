//! Brute-force L2 index
//!
//! Vectors live in one contiguous buffer, row `i` belonging to corpus
//! position `i`. Large scans are split across the rayon pool. The index is
//! never mutated after `build`, so concurrent searches need no locking.

use rayon::prelude::*;
use std::cmp::Ordering;

use super::{Neighbor, VectorIndex};
use crate::embeddings::squared_l2;
use crate::error::{Error, Result};

/// Below this many vectors a sequential scan is faster than fanning out
const PARALLEL_THRESHOLD: usize = 2048;

/// Exact squared-L2 index
#[derive(Debug, Clone)]
pub struct FlatIndex {
    data: Vec<f32>,
    dimensions: usize,
    len: usize,
}

impl FlatIndex {
    /// Build from the full ordered sequence of embeddings
    pub fn build(embeddings: Vec<Vec<f32>>, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::invalid_argument("index dimensions must be > 0"));
        }

        let len = embeddings.len();
        let mut data = Vec::with_capacity(len * dimensions);

        for (position, vector) in embeddings.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(Error::invalid_argument(format!(
                    "vector {} has {} dimensions, expected {}",
                    position,
                    vector.len(),
                    dimensions
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::invalid_argument(format!(
                    "vector {} has a non-finite component",
                    position
                )));
            }
            data.extend_from_slice(&vector);
        }

        tracing::debug!("Built flat index: {} vectors x {} dimensions", len, dimensions);

        Ok(Self {
            data,
            dimensions,
            len,
        })
    }

    fn distances(&self, query: &[f32]) -> Vec<Neighbor> {
        let to_neighbor = |(position, row): (usize, &[f32])| Neighbor {
            distance: squared_l2(row, query),
            position,
        };

        if self.len >= PARALLEL_THRESHOLD {
            self.data
                .par_chunks_exact(self.dimensions)
                .enumerate()
                .map(to_neighbor)
                .collect()
        } else {
            self.data
                .chunks_exact(self.dimensions)
                .enumerate()
                .map(to_neighbor)
                .collect()
        }
    }
}

fn nearest_first(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.len == 0 {
            return Err(Error::IndexEmpty);
        }
        if k == 0 {
            return Err(Error::invalid_argument("k must be at least 1"));
        }
        if query.len() != self.dimensions {
            return Err(Error::invalid_argument(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid_argument("query has a non-finite component"));
        }

        let k = k.min(self.len);
        let mut neighbors = self.distances(query);

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, nearest_first);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(nearest_first);

        Ok(neighbors)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "flat-l2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|n| n.position).collect()
    }

    #[test]
    fn test_small_example() {
        let index = FlatIndex::build(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![10.0, 10.0]],
            2,
        )
        .unwrap();

        let hits = index.search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(positions(&hits), vec![0, 1, 2]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 2.0);
        assert_eq!(hits[2].distance, 181.0);
    }

    #[test]
    fn test_k_is_clamped() {
        let index = FlatIndex::build(vec![vec![1.0], vec![2.0]], 1).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_ties_break_by_position() {
        let index = FlatIndex::build(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]],
            2,
        )
        .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(positions(&hits), vec![0, 1, 2]);
        assert!(hits.iter().all(|n| n.distance == 1.0));
    }

    #[test]
    fn test_duplicate_vectors_are_distinct_hits() {
        let index = FlatIndex::build(vec![vec![3.0, 3.0]; 4], 2).unwrap();
        let hits = index.search(&[3.0, 3.0], 4).unwrap();
        assert_eq!(positions(&hits), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_partial_selection_matches_full_sort() {
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| vec![((i * 37) % 101) as f32, ((i * 11) % 13) as f32])
            .collect();
        let index = FlatIndex::build(vectors, 2).unwrap();

        let all = index.search(&[50.0, 6.0], 200).unwrap();
        let top = index.search(&[50.0, 6.0], 7).unwrap();
        assert_eq!(top, all[..7].to_vec());

        for pair in all.windows(2) {
            assert!(nearest_first(&pair[0], &pair[1]) == Ordering::Less);
        }
    }

    #[test]
    fn test_parallel_scan_is_deterministic() {
        let vectors: Vec<Vec<f32>> = (0..PARALLEL_THRESHOLD + 500)
            .map(|i| vec![(i % 17) as f32, (i % 5) as f32, 1.0])
            .collect();

        let first = FlatIndex::build(vectors.clone(), 3).unwrap();
        let second = FlatIndex::build(vectors, 3).unwrap();

        let query = [4.0, 2.0, 1.0];
        let a = first.search(&query, 25).unwrap();
        let b = second.search(&query, 25).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].distance, 0.0);
        // first i with i % 17 == 4 and i % 5 == 2
        assert_eq!(a[0].position, 72);
    }

    #[test]
    fn test_invalid_arguments() {
        let index = FlatIndex::build(vec![vec![0.0, 0.0]], 2).unwrap();
        assert!(matches!(index.search(&[0.0, 0.0], 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(index.search(&[0.0], 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            index.search(&[f32::NAN, 0.0], 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_index() {
        let index = FlatIndex::build(Vec::new(), 4).unwrap();
        assert!(index.is_empty());
        assert!(matches!(index.search(&[0.0; 4], 1), Err(Error::IndexEmpty)));
    }

    #[test]
    fn test_build_rejects_bad_vectors() {
        assert!(matches!(
            FlatIndex::build(vec![vec![0.0, 0.0], vec![0.0]], 2),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            FlatIndex::build(vec![vec![f32::INFINITY]], 1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(FlatIndex::build(Vec::new(), 0), Err(Error::InvalidArgument(_))));
    }
}
