//! Inverted-file (IVF) index.
//!
//! `rebuild` runs Lloyd's k-means over all vectors to produce `k_c`
//! centroids with one posting list each. A query scores the centroids,
//! probes the `n_probe` nearest clusters, and ranks only the vectors in
//! those posting lists: O(k_c·d + m·d) where m is the probed population.
//!
//! Incremental `add` assigns to the nearest existing centroid without
//! moving it; centroid drift is tolerated until the next full `rebuild`.

use crate::config;
use crate::index::{top_k, IndexItem, ScoredId, VectorIndex};
use crate::vector::{cosine_distance, cosine_similarity, mean, normalize};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Tuning knobs for an IVF index, fixed at `add_index` time.
#[derive(Debug, Clone)]
pub struct IvfConfig {
    /// Number of clusters. Defaults to `max(1, ⌊√n⌋)` at build time.
    pub n_clusters: Option<usize>,
    /// Clusters probed per query. Defaults to `max(1, ⌈k_c/4⌉)`.
    pub n_probe: Option<usize>,
    /// Lloyd iteration cap for a rebuild.
    pub max_iterations: usize,
    /// PRNG seed for centroid initialization; fixed for reproducible builds.
    pub seed: u64,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self {
            n_clusters: None,
            n_probe: None,
            max_iterations: config::IVF_DEFAULT_MAX_ITERATIONS,
            seed: config::IVF_DEFAULT_SEED,
        }
    }
}

/// k-means centroids plus per-centroid posting lists of record ids.
#[derive(Debug)]
pub struct IvfIndex {
    config: IvfConfig,
    centroids: Vec<Vec<f32>>,
    /// Posting list per centroid, parallel to `centroids`.
    postings: Vec<BTreeSet<Uuid>>,
    /// Reverse map: id → centroid index, for O(1) removal.
    assignments: HashMap<Uuid, usize>,
    vectors: HashMap<Uuid, Vec<f32>>,
}

impl Default for IvfIndex {
    fn default() -> Self {
        Self::new(IvfConfig::default())
    }
}

impl IvfIndex {
    pub fn new(config: IvfConfig) -> Self {
        Self {
            config,
            centroids: Vec::new(),
            postings: Vec::new(),
            assignments: HashMap::new(),
            vectors: HashMap::new(),
        }
    }

    /// Number of centroids currently trained.
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Index of the centroid nearest to `vector` by cosine distance.
    /// Ties resolve to the lowest centroid index.
    fn nearest_centroid(&self, vector: &[f32]) -> usize {
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (idx, centroid) in self.centroids.iter().enumerate() {
            let dist = cosine_distance(vector, centroid);
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        best
    }

    /// Effective probe count for the current centroid population.
    fn probe_count(&self) -> usize {
        let k_c = self.centroids.len();
        self.config
            .n_probe
            .unwrap_or_else(|| std::cmp::max(1, k_c.div_ceil(4)))
            .min(k_c)
    }

    /// Run Lloyd's algorithm over `items`, filling centroids, postings,
    /// and the id → centroid assignment map.
    fn train(&mut self, items: &[IndexItem]) {
        let n = items.len();
        let k_c = self
            .config
            .n_clusters
            .unwrap_or_else(|| std::cmp::max(1, (n as f64).sqrt().floor() as usize))
            .min(n);

        // Seeded sampling without replacement for the initial centroids.
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let chosen = rand::seq::index::sample(&mut rng, n, k_c);
        self.centroids = chosen
            .iter()
            .map(|i| normalize(&items[i].vector))
            .collect();

        let mut assignments: Vec<usize> = vec![0; n];
        for iteration in 0..self.config.max_iterations {
            let new_assignments: Vec<usize> = items
                .iter()
                .map(|item| self.nearest_centroid(&item.vector))
                .collect();

            if iteration > 0 && new_assignments == assignments {
                assignments = new_assignments;
                break;
            }
            assignments = new_assignments;

            // Recompute each centroid as the normalized mean of its members.
            for c in 0..k_c {
                let members: Vec<&[f32]> = items
                    .iter()
                    .zip(assignments.iter())
                    .filter(|(_, &a)| a == c)
                    .map(|(item, _)| item.vector.as_slice())
                    .collect();
                if !members.is_empty() {
                    self.centroids[c] = normalize(&mean(members));
                }
            }

            // Reseed empty clusters from the vector farthest from its
            // assigned centroid; each reseed claims a distinct vector.
            let empty: Vec<usize> = (0..k_c)
                .filter(|c| !assignments.contains(c))
                .collect();
            if !empty.is_empty() {
                let dists: Vec<f32> = items
                    .iter()
                    .zip(assignments.iter())
                    .map(|(item, &a)| cosine_distance(&item.vector, &self.centroids[a]))
                    .collect();
                let mut claimed: BTreeSet<usize> = BTreeSet::new();
                for c in empty {
                    let farthest = (0..n)
                        .filter(|i| !claimed.contains(i))
                        .max_by(|&a, &b| {
                            dists[a]
                                .partial_cmp(&dists[b])
                                .unwrap_or(std::cmp::Ordering::Equal)
                        });
                    if let Some(i) = farthest {
                        claimed.insert(i);
                        self.centroids[c] = normalize(&items[i].vector);
                    }
                }
            }
        }

        self.postings = vec![BTreeSet::new(); k_c];
        for (item, &c) in items.iter().zip(assignments.iter()) {
            self.postings[c].insert(item.id);
            self.assignments.insert(item.id, c);
        }
    }
}

impl VectorIndex for IvfIndex {
    fn rebuild(&mut self, items: &[IndexItem]) {
        self.centroids.clear();
        self.postings.clear();
        self.assignments.clear();
        self.vectors.clear();
        if items.is_empty() {
            return;
        }
        self.vectors = items
            .iter()
            .map(|item| (item.id, item.vector.clone()))
            .collect();
        self.train(items);
    }

    fn add(&mut self, id: Uuid, vector: &[f32]) {
        // Re-adding an id must not leave a stale posting behind.
        if self.assignments.contains_key(&id) {
            self.remove(&id);
        }
        if self.centroids.is_empty() {
            self.centroids.push(normalize(vector));
            self.postings.push(BTreeSet::new());
        }
        let c = self.nearest_centroid(vector);
        self.postings[c].insert(id);
        self.assignments.insert(id, c);
        self.vectors.insert(id, vector.to_vec());
    }

    fn remove(&mut self, id: &Uuid) {
        if let Some(c) = self.assignments.remove(id) {
            self.postings[c].remove(id);
        }
        self.vectors.remove(id);
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<ScoredId> {
        if self.centroids.is_empty() || k == 0 {
            return Vec::new();
        }

        // Rank centroids by similarity to the query, probe the best few.
        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, cosine_similarity(query, c)))
            .collect();
        ranked.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let candidates = ranked
            .iter()
            .take(self.probe_count())
            .flat_map(|(idx, _)| self.postings[*idx].iter());

        top_k(
            candidates.filter_map(|id| {
                self.vectors
                    .get(id)
                    .map(|v| (*id, cosine_similarity(query, v)))
            }),
            k,
        )
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
