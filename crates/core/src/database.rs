//! Database: the three typed collections under one data root.
//!
//! `{data_dir}/libraries`, `{data_dir}/documents`, and `{data_dir}/chunks`
//! each back one [`Collection`]. The database also owns the cascade rules:
//! deleting a document removes its chunks, deleting a library removes its
//! documents and their chunks. Cascades are best-effort sequential; there
//! are no cross-file transactions.

use crate::collection::Collection;
use crate::error::{Result, StoreError};
use crate::record::{Chunk, Document, Library};
use std::path::Path;
use uuid::Uuid;

/// Chunks live under this subdirectory of the data root.
pub const CHUNKS_DIR: &str = "chunks";
/// Documents live under this subdirectory of the data root.
pub const DOCUMENTS_DIR: &str = "documents";
/// Libraries live under this subdirectory of the data root.
pub const LIBRARIES_DIR: &str = "libraries";

/// All collections of one shelfdb instance.
#[derive(Clone)]
pub struct Database {
    pub libraries: Collection<Library>,
    pub documents: Collection<Document>,
    pub chunks: Collection<Chunk>,
}

impl Database {
    /// Opens (creating if needed) the three collection directories under
    /// `data_dir`. Indexes are attached separately by the caller, followed
    /// by [`Database::startup_rebuild`].
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let root = data_dir.as_ref();
        Ok(Self {
            libraries: Collection::open(root.join(LIBRARIES_DIR))?,
            documents: Collection::open(root.join(DOCUMENTS_DIR))?,
            chunks: Collection::open(root.join(CHUNKS_DIR))?,
        })
    }

    /// Rebuild every attached index in every collection from disk.
    pub fn startup_rebuild(&self) -> Result<()> {
        self.libraries.startup_rebuild()?;
        self.documents.startup_rebuild()?;
        self.chunks.startup_rebuild()?;
        Ok(())
    }

    /// Delete a document and all chunks referencing it.
    /// Returns the number of chunks removed.
    pub fn delete_document(&self, id: &Uuid) -> Result<usize> {
        self.documents.delete(id)?;
        let orphaned: Vec<Uuid> = self
            .chunks
            .list()?
            .into_iter()
            .filter(|c| c.document_id == *id)
            .map(|c| c.id)
            .collect();
        let mut removed = 0;
        for chunk_id in orphaned {
            match self.chunks.delete(&chunk_id) {
                Ok(()) => removed += 1,
                // Raced with another delete; the end state is what matters.
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Delete a library, its documents, and their chunks.
    /// Returns `(documents_removed, chunks_removed)`.
    pub fn delete_library(&self, id: &Uuid) -> Result<(usize, usize)> {
        self.libraries.delete(id)?;
        let owned: Vec<Uuid> = self
            .documents
            .list()?
            .into_iter()
            .filter(|d| d.library_id == *id)
            .map(|d| d.id)
            .collect();
        let mut documents_removed = 0;
        let mut chunks_removed = 0;
        for doc_id in owned {
            match self.delete_document(&doc_id) {
                Ok(n) => {
                    documents_removed += 1;
                    chunks_removed += n;
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok((documents_removed, chunks_removed))
    }
}
