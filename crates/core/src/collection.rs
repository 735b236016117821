//! Collection: one record kind bound to its store and its indexes.
//!
//! A collection is the single entry point for CRUD and query. It owns the
//! record store directory and every attached index, and guards both behind
//! one readers-writer lock: `get`/`list`/`search` take shared access,
//! mutations and rebuilds take exclusive access. Embedding calls happen
//! before entering the collection, so the lock is never held across
//! external I/O other than the store's own file operations.
//!
//! Mutation order is store-first: a failed file write aborts the operation
//! with the indexes untouched; indexes are only told about records the
//! store has accepted.

use crate::config;
use crate::error::{Result, StoreError};
use crate::filter::{matches_filter, FilterClause};
use crate::index::{IndexItem, IndexKind, VectorIndex};
use crate::record::Record;
use crate::store::RecordStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// A search result with the full record payload resolved from the store.
#[derive(Debug, Clone)]
pub struct SearchHit<R> {
    pub record: R,
    pub score: f32,
}

struct CollectionInner<R: Record> {
    store: RecordStore<R>,
    indexes: BTreeMap<IndexKind, Box<dyn VectorIndex>>,
    /// Embedding dimension, established by the first vector seen.
    dimension: Option<usize>,
}

/// A thread-safe collection of records with attached similarity indexes.
///
/// Cloning produces a new handle to the same shared state.
pub struct Collection<R: Record> {
    inner: Arc<RwLock<CollectionInner<R>>>,
}

impl<R: Record> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> Collection<R> {
    /// Opens a collection over the given storage directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(RwLock::new(CollectionInner {
                store: RecordStore::open(path)?,
                indexes: BTreeMap::new(),
                dimension: None,
            })),
        })
    }

    /// Attach an index and build it from current store contents.
    pub fn add_index(&self, kind: IndexKind, mut index: Box<dyn VectorIndex>) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let items = index_items(&inner.store, &mut inner.dimension)?;
        index.rebuild(&items);
        inner.indexes.insert(kind, index);
        Ok(())
    }

    /// Reload every record from disk and rebuild every attached index.
    ///
    /// Called once per collection at process start; also the documented
    /// recovery from IVF centroid drift.
    pub fn startup_rebuild(&self) -> Result<usize> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let items = index_items(&inner.store, &mut inner.dimension)?;
        for index in inner.indexes.values_mut() {
            index.rebuild(&items);
        }
        tracing::info!(
            records = items.len(),
            indexes = inner.indexes.len(),
            "index rebuild complete"
        );
        Ok(items.len())
    }

    /// Persist a new record and notify every index.
    pub fn create(&self, record: R) -> Result<R> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        check_dimension(&mut inner.dimension, record.embedding())?;

        inner.store.put(&record)?;
        if let Some(embedding) = record.embedding() {
            let id = record.id();
            let vector = embedding.to_vec();
            for index in inner.indexes.values_mut() {
                index.add(id, &vector);
            }
        }
        Ok(record)
    }

    /// Fetch one record. `NotFound` if absent.
    pub fn get(&self, id: &Uuid) -> Result<R> {
        self.inner.read().store.get(id)
    }

    /// Load every record in the collection.
    pub fn list(&self) -> Result<Vec<R>> {
        self.inner.read().store.load_all()
    }

    /// Whether a record exists.
    pub fn exists(&self, id: &Uuid) -> bool {
        self.inner.read().store.exists(id)
    }

    /// Replace an existing record: the store file is rewritten, then the
    /// indexes swap the old entry for the new one. A failed write leaves
    /// the indexes untouched. Bumps the record's `updated_at`.
    pub fn update(&self, id: &Uuid, mut record: R) -> Result<R> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if !inner.store.exists(id) {
            return Err(StoreError::NotFound(format!("record {id}")));
        }
        check_dimension(&mut inner.dimension, record.embedding())?;
        record.touch();

        inner.store.put(&record)?;
        for index in inner.indexes.values_mut() {
            index.remove(id);
        }
        if let Some(embedding) = record.embedding() {
            let vector = embedding.to_vec();
            for index in inner.indexes.values_mut() {
                index.add(*id, &vector);
            }
        }
        Ok(record)
    }

    /// Delete a record. Strict: a missing id reports `NotFound` (a second
    /// delete of the same id leaves the same end state).
    pub fn delete(&self, id: &Uuid) -> Result<()> {
        let mut inner = self.inner.write();
        inner.store.delete(id)?;
        for index in inner.indexes.values_mut() {
            index.remove(id);
        }
        Ok(())
    }

    /// Top-k similarity search through the selected index, resolving ids
    /// to full payloads and post-filtering on metadata.
    pub fn search(
        &self,
        kind: IndexKind,
        query: &[f32],
        k: usize,
        filter: Option<&FilterClause>,
    ) -> Result<Vec<SearchHit<R>>> {
        if k == 0 {
            return Err(StoreError::InvalidInput("limit must be positive".into()));
        }
        let inner = self.inner.read();
        if let Some(d) = inner.dimension {
            if query.len() != d {
                return Err(StoreError::DimensionMismatch {
                    expected: d,
                    actual: query.len(),
                });
            }
        }
        let index = inner
            .indexes
            .get(&kind)
            .ok_or_else(|| StoreError::UnknownIndex(kind.to_string()))?;

        // Post-filtering discards hits, so overfetch when a filter is set.
        let fetch_k = if filter.is_some() {
            k.saturating_mul(config::FILTER_OVERFETCH)
        } else {
            k
        };

        let mut hits = Vec::with_capacity(k);
        for scored in index.search(query, fetch_k) {
            let record = match inner.store.get(&scored.id) {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => {
                    // Index briefly ahead of the store; drop the hit.
                    tracing::warn!(id = %scored.id, "index returned id absent from store");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Some(clause) = filter {
                if !matches_filter(record.metadata(), clause) {
                    continue;
                }
            }
            hits.push(SearchHit {
                record,
                score: scored.score,
            });
            if hits.len() == k {
                break;
            }
        }
        Ok(hits)
    }

    /// Number of records on disk.
    pub fn len(&self) -> Result<usize> {
        self.inner.read().store.len()
    }

    /// Whether the collection holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        self.inner.read().store.is_empty()
    }

    /// The attached index kinds.
    pub fn index_kinds(&self) -> Vec<IndexKind> {
        self.inner.read().indexes.keys().copied().collect()
    }

    /// Item count per attached index.
    pub fn index_sizes(&self) -> BTreeMap<IndexKind, usize> {
        self.inner
            .read()
            .indexes
            .iter()
            .map(|(kind, index)| (*kind, index.len()))
            .collect()
    }

    /// The established embedding dimension, if any vector has been seen.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension
    }
}

/// Load all embedding-bearing records as index items, establishing the
/// collection dimension from the first vector seen.
fn index_items<R: Record>(
    store: &RecordStore<R>,
    dimension: &mut Option<usize>,
) -> Result<Vec<IndexItem>> {
    let mut items = Vec::new();
    for record in store.load_all()? {
        if let Some(embedding) = record.embedding() {
            if dimension.is_none() {
                *dimension = Some(embedding.len());
            }
            items.push(IndexItem::new(record.id(), embedding.to_vec()));
        }
    }
    Ok(items)
}

/// Validate an embedding against the established dimension, establishing
/// it on first contact. Rejects before any store write.
fn check_dimension(dimension: &mut Option<usize>, embedding: Option<&[f32]>) -> Result<()> {
    let Some(embedding) = embedding else {
        return Ok(());
    };
    if embedding.is_empty() || embedding.len() > config::MAX_DIMENSION {
        return Err(StoreError::InvalidInput(format!(
            "embedding length must be 1-{}",
            config::MAX_DIMENSION
        )));
    }
    match *dimension {
        Some(d) if d != embedding.len() => Err(StoreError::DimensionMismatch {
            expected: d,
            actual: embedding.len(),
        }),
        Some(_) => Ok(()),
        None => {
            *dimension = Some(embedding.len());
            Ok(())
        }
    }
}
