//! Navigable small world (NSW) graph index.
//!
//! A flat proximity graph: every node keeps an adjacency set of ids, edges
//! are symmetric, and search is a greedy best-first walk with a bounded
//! candidate list (`ef`). Insertion wires a new node to its `m` nearest
//! neighbors found by the same greedy walk; when a back-edge pushes a
//! neighbor's degree past `2·m`, that neighbor's list is pruned back to the
//! `m` closest and the dropped reverse edges are erased too, so the graph
//! never holds one-way edges.
//!
//! Removal repairs the hole it leaves: the removed node's former neighbors
//! are chained together, so a connected graph stays connected and every
//! surviving node remains reachable from the entry point.

use crate::config;
use crate::index::{sort_scored, IndexItem, ScoredId, VectorIndex};
use crate::vector::cosine_distance;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use uuid::Uuid;

/// Tuning knobs for an NSW index, fixed at `add_index` time.
#[derive(Debug, Clone)]
pub struct NswConfig {
    /// Target degree: new nodes link to this many neighbors.
    pub m: usize,
    /// Candidate list size during insertion.
    pub ef_construction: usize,
    /// Candidate list size during search; the effective value is
    /// `max(ef_search, k)`.
    pub ef_search: usize,
}

impl Default for NswConfig {
    fn default() -> Self {
        Self {
            m: config::NSW_DEFAULT_M,
            ef_construction: config::NSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::NSW_DEFAULT_EF_SEARCH,
        }
    }
}

/// A graph node: the vector plus an ordered adjacency set.
#[derive(Debug, Clone)]
struct NswNode {
    vector: Vec<f32>,
    neighbors: BTreeSet<Uuid>,
}

/// Candidate during a greedy walk, ordered nearest-first.
///
/// `BinaryHeap` is a max-heap, so `Ord` is reversed on distance; equal
/// distances order by descending id so the heap pops ascending ids first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    distance: OrderedFloat<f32>,
    id: Uuid,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result entry during a greedy walk: a max-heap by distance, so the peek
/// is the worst kept result and can be evicted when over capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: Uuid,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Bidirectional proximity graph with a single entry point.
#[derive(Debug)]
pub struct NswIndex {
    config: NswConfig,
    nodes: HashMap<Uuid, NswNode>,
    entry_point: Option<Uuid>,
}

impl Default for NswIndex {
    fn default() -> Self {
        Self::new(NswConfig::default())
    }
}

impl NswIndex {
    pub fn new(config: NswConfig) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
            entry_point: None,
        }
    }

    /// Greedy best-first walk from `entry`, keeping the `ef` nearest
    /// visited nodes. Returns them sorted ascending by distance.
    fn greedy(&self, query: &[f32], entry: Uuid, ef: usize) -> Vec<(Uuid, f32)> {
        let Some(entry_node) = self.nodes.get(&entry) else {
            return Vec::new();
        };

        let mut visited: HashSet<Uuid> = HashSet::with_capacity(ef * 2);
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);

        let entry_dist = cosine_distance(query, &entry_node.vector);
        visited.insert(entry);
        candidates.push(Candidate {
            distance: OrderedFloat(entry_dist),
            id: entry,
        });
        results.push(ResultEntry {
            distance: OrderedFloat(entry_dist),
            id: entry,
        });
        // Cached worst kept distance saves a peek per neighbor in the hot loop.
        let mut worst_dist = entry_dist;

        while let Some(current) = candidates.pop() {
            if results.len() >= ef && current.distance.0 > worst_dist {
                break;
            }
            let Some(node) = self.nodes.get(&current.id) else {
                continue;
            };
            for &neighbor_id in &node.neighbors {
                if !visited.insert(neighbor_id) {
                    continue;
                }
                let Some(neighbor) = self.nodes.get(&neighbor_id) else {
                    continue;
                };
                let dist = cosine_distance(query, &neighbor.vector);
                if results.len() < ef || dist < worst_dist {
                    candidates.push(Candidate {
                        distance: OrderedFloat(dist),
                        id: neighbor_id,
                    });
                    results.push(ResultEntry {
                        distance: OrderedFloat(dist),
                        id: neighbor_id,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    worst_dist = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }

        results
            .into_sorted_vec()
            .into_iter()
            .map(|r| (r.id, r.distance.0))
            .collect()
    }

    /// Remove the edge between `a` and `b` from both adjacency sets.
    fn drop_edge(&mut self, a: Uuid, b: Uuid) {
        if let Some(node) = self.nodes.get_mut(&a) {
            node.neighbors.remove(&b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.neighbors.remove(&a);
        }
    }

    /// If `id`'s degree exceeds `2·m`, keep only the `m` closest neighbors
    /// and drop the reverse edges of everything pruned away.
    fn prune_neighbors(&mut self, id: Uuid) {
        let m_max = self.config.m * 2;
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.neighbors.len() <= m_max {
            return;
        }

        let base = node.vector.clone();
        let mut ranked: Vec<(Uuid, f32)> = node
            .neighbors
            .iter()
            .filter_map(|n| {
                self.nodes
                    .get(n)
                    .map(|other| (*n, cosine_distance(&base, &other.vector)))
            })
            .collect();
        ranked.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        for (dropped, _) in ranked.iter().skip(self.config.m) {
            // Keep the edge if cutting it would orphan the neighbor.
            let degree = self.nodes.get(dropped).map_or(0, |n| n.neighbors.len());
            if degree > 1 {
                self.drop_edge(id, *dropped);
            }
        }
    }

    /// Promote a new entry point after the current one was removed:
    /// the surviving node with the highest degree, ties by ascending id.
    fn promote_entry_point(&mut self) {
        self.entry_point = self
            .nodes
            .iter()
            .max_by(|(a_id, a), (b_id, b)| {
                a.neighbors
                    .len()
                    .cmp(&b.neighbors.len())
                    .then_with(|| b_id.cmp(a_id))
            })
            .map(|(id, _)| *id);
    }
}

impl VectorIndex for NswIndex {
    fn rebuild(&mut self, items: &[IndexItem]) {
        self.nodes.clear();
        self.entry_point = None;
        for item in items {
            self.add(item.id, &item.vector);
        }
    }

    fn add(&mut self, id: Uuid, vector: &[f32]) {
        // Re-adding an id replaces it entirely.
        if self.nodes.contains_key(&id) {
            self.remove(&id);
        }

        let Some(entry) = self.entry_point else {
            self.nodes.insert(
                id,
                NswNode {
                    vector: vector.to_vec(),
                    neighbors: BTreeSet::new(),
                },
            );
            self.entry_point = Some(id);
            return;
        };

        let nearest = self.greedy(vector, entry, self.config.ef_construction);
        let chosen: Vec<Uuid> = nearest
            .iter()
            .take(self.config.m)
            .map(|(n, _)| *n)
            .collect();

        self.nodes.insert(
            id,
            NswNode {
                vector: vector.to_vec(),
                neighbors: chosen.iter().copied().collect(),
            },
        );
        for neighbor in chosen {
            if let Some(node) = self.nodes.get_mut(&neighbor) {
                node.neighbors.insert(id);
            }
            self.prune_neighbors(neighbor);
        }
    }

    fn remove(&mut self, id: &Uuid) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        // Edges are symmetric, so the node's own adjacency set names every
        // node that links back to it.
        let former: Vec<Uuid> = node.neighbors.into_iter().collect();
        for neighbor in &former {
            if let Some(other) = self.nodes.get_mut(neighbor) {
                other.neighbors.remove(id);
            }
        }
        // Chain the former neighbors together so any path that ran through
        // the removed node still exists. BTreeSet iteration gives them in
        // ascending id order, keeping the repair deterministic.
        for pair in former.windows(2) {
            if let [a, b] = pair {
                if self.nodes.contains_key(a) && self.nodes.contains_key(b) {
                    if let Some(node) = self.nodes.get_mut(a) {
                        node.neighbors.insert(*b);
                    }
                    if let Some(node) = self.nodes.get_mut(b) {
                        node.neighbors.insert(*a);
                    }
                }
            }
        }
        if self.entry_point == Some(*id) {
            self.promote_entry_point();
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<ScoredId> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let ef = self.config.ef_search.max(k);
        let mut results: Vec<ScoredId> = self
            .greedy(query, entry, ef)
            .into_iter()
            .map(|(id, distance)| ScoredId {
                id,
                score: 1.0 - distance,
            })
            .collect();
        sort_scored(&mut results);
        results.truncate(k);
        results
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}
