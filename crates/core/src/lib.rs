//! # shelfdb-core
//!
//! Embeddable vector database engine. Records (libraries, documents, text
//! chunks with embeddings) are persisted one JSON file each; in-memory
//! similarity indexes answer top-k queries and are rebuilt from the record
//! store on startup.
//!
//! This is the core library crate with zero async dependencies. The HTTP
//! surface lives in `shelfdb-server`.

/// Collection: binds a record store to its similarity indexes with a
/// readers-writer locking discipline.
pub mod collection;
/// Global configuration constants: index defaults, limits, and server defaults.
pub mod config;
/// Database: the three typed collections under one data root, with cascades.
pub mod database;
/// Error types shared across the storage and index layers.
pub mod error;
/// Metadata filter clauses and their evaluation against record metadata.
pub mod filter;
/// Similarity indexes: capability trait plus exact, IVF, and NSW strategies.
pub mod index;
/// Core record types: `Library`, `Document`, `Chunk`, and `MetadataValue`.
pub mod record;
/// File-per-record JSON store with atomic writes.
pub mod store;
/// Vector math kernels: dot product, norm, cosine distance, centroid mean.
pub mod vector;

pub use collection::Collection;
pub use database::Database;
pub use error::{Result, StoreError};
pub use index::{IndexKind, ScoredId, VectorIndex};
pub use record::{Chunk, Document, Library, MetadataValue, Record};
pub use store::RecordStore;
