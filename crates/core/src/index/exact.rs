//! Brute-force cosine similarity index.
//!
//! Scans every stored vector per query. O(n·d) search with O(k) extra
//! space via a bounded min-heap. Deterministic, and used as ground truth for
//! the approximate indexes.

use crate::index::{top_k, IndexItem, ScoredId, VectorIndex};
use crate::vector::cosine_similarity;
use std::collections::HashMap;
use uuid::Uuid;

/// Exact k-NN index over a flat `id → vector` map.
#[derive(Debug, Default)]
pub struct ExactCosineIndex {
    vectors: HashMap<Uuid, Vec<f32>>,
}

impl ExactCosineIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorIndex for ExactCosineIndex {
    fn rebuild(&mut self, items: &[IndexItem]) {
        self.vectors.clear();
        for item in items {
            self.vectors.insert(item.id, item.vector.clone());
        }
    }

    fn add(&mut self, id: Uuid, vector: &[f32]) {
        self.vectors.insert(id, vector.to_vec());
    }

    fn remove(&mut self, id: &Uuid) {
        self.vectors.remove(id);
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<ScoredId> {
        top_k(
            self.vectors
                .iter()
                .map(|(id, v)| (*id, cosine_similarity(query, v))),
            k,
        )
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
