//! Similarity indexes.
//!
//! A collection owns zero or more indexes behind the [`VectorIndex`] trait;
//! the query request selects one by [`IndexKind`] tag. Indexes hold vectors
//! by value, live only in memory, and are rebuilt from the record store on
//! startup.

/// Brute-force cosine scan; exact ground truth.
pub mod exact;
/// Inverted-file index: k-means centroids with posting lists.
pub mod ivf;
/// Navigable small world graph with greedy search.
pub mod nsw;

pub use exact::ExactCosineIndex;
pub use ivf::{IvfConfig, IvfIndex};
pub use nsw::{NswConfig, NswIndex};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::fmt;
use uuid::Uuid;

/// Tag selecting one of the attached indexes at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force cosine similarity.
    Cosine,
    /// Inverted-file approximate index.
    Ivf,
    /// Navigable-small-world graph index.
    Nsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexKind::Cosine => "cosine",
            IndexKind::Ivf => "ivf",
            IndexKind::Nsw => "nsw",
        };
        f.write_str(s)
    }
}

/// One item handed to an index: the record id and its embedding.
#[derive(Debug, Clone)]
pub struct IndexItem {
    pub id: Uuid,
    pub vector: Vec<f32>,
}

impl IndexItem {
    pub fn new(id: Uuid, vector: Vec<f32>) -> Self {
        Self { id, vector }
    }
}

/// A search hit: record id plus similarity score (higher = closer).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f32,
}

/// Capability contract every index strategy implements.
///
/// The collection treats indexes as opaque beyond these four operations.
/// `add`/`remove` must preserve each index's internal invariants; `search`
/// returns at most `k` results in descending score order with ties broken
/// by ascending id.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Replace all internal state with the given items.
    fn rebuild(&mut self, items: &[IndexItem]);

    /// Incorporate one item.
    fn add(&mut self, id: Uuid, vector: &[f32]);

    /// Drop the item; a no-op when the id is unknown.
    fn remove(&mut self, id: &Uuid);

    /// Top-k most similar items to `query`.
    fn search(&self, query: &[f32], k: usize) -> Vec<ScoredId>;

    /// Number of items currently indexed.
    fn len(&self) -> usize;

    /// Whether the index holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Heap entry for bounded top-k selection.
///
/// Ordered so that `BinaryHeap::peek` is the *worst* kept result: lowest
/// score first, and among equal scores the highest id first (so the
/// surviving set prefers ascending ids).
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorstFirst {
    score: OrderedFloat<f32>,
    id: Uuid,
}

impl Ord for WorstFirst {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for WorstFirst {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Select the k highest-scoring entries from a stream of `(id, score)`
/// pairs using a bounded min-heap: O(n log k) time, O(k) space.
///
/// Output is sorted by descending score, ties by ascending id.
pub(crate) fn top_k(entries: impl Iterator<Item = (Uuid, f32)>, k: usize) -> Vec<ScoredId> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<WorstFirst> = BinaryHeap::with_capacity(k + 1);
    for (id, score) in entries {
        heap.push(WorstFirst {
            score: OrderedFloat(score),
            id,
        });
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut results: Vec<ScoredId> = heap
        .into_iter()
        .map(|e| ScoredId {
            id: e.id,
            score: e.score.0,
        })
        .collect();
    sort_scored(&mut results);
    results
}

/// Sort hits by descending score, ties by ascending id.
pub(crate) fn sort_scored(results: &mut [ScoredId]) {
    results.sort_unstable_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| a.id.cmp(&b.id))
    });
}
