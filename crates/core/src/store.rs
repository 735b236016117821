//! File-per-record JSON store.
//!
//! Each record kind gets one directory; each record is a `{uuid}.json` file
//! holding the record's full JSON representation. Writes go through a
//! temp-file + rename so a crash never leaves a half-written `.json` in
//! place; stray `.json.tmp` files are invisible to [`RecordStore::list_ids`]
//! and get overwritten by the next put of the same id.

use crate::error::{Result, StoreError};
use crate::record::Record;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A directory of JSON files keyed by record id.
#[derive(Debug)]
pub struct RecordStore<R: Record> {
    root: PathBuf,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> RecordStore<R> {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            _marker: PhantomData,
        })
    }

    /// The directory this store owns.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Serialize and write a record, overwriting any existing file for the
    /// same id. The write is atomic: temp file then rename.
    pub fn put(&self, record: &R) -> Result<()> {
        let id = record.id();
        let bytes = serde_json::to_vec(record)?;
        let path = self.file_path(&id);
        let tmp_path = self.root.join(format!("{id}.json.tmp"));
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Read and deserialize a record. `NotFound` if the file is absent.
    pub fn get(&self, id: &Uuid) -> Result<R> {
        let path = self.file_path(id);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("record {id}"))
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Unlink a record file. `NotFound` if it was already absent.
    pub fn delete(&self, id: &Uuid) -> Result<()> {
        fs::remove_file(self.file_path(id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(format!("record {id}"))
            } else {
                StoreError::Io(e)
            }
        })
    }

    /// Whether a record file exists for `id`.
    pub fn exists(&self, id: &Uuid) -> bool {
        self.file_path(id).exists()
    }

    /// Enumerate record ids by scanning `*.json` filenames.
    ///
    /// Files whose stem is not a UUID (including `.json.tmp` leftovers from
    /// interrupted writes) are skipped.
    pub fn list_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = Uuid::parse_str(stem) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Load every record in the store.
    ///
    /// Unreadable or corrupt files are logged and skipped so one bad file
    /// does not block a startup rebuild.
    pub fn load_all(&self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for id in self.list_ids()? {
            match self.get(&id) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("skipping unreadable record {id}: {e}");
                }
            }
        }
        Ok(records)
    }

    /// Number of records currently on disk.
    pub fn len(&self) -> Result<usize> {
        Ok(self.list_ids()?.len())
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Chunk, Library};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn chunk(embedding: Vec<f32>) -> Chunk {
        Chunk::new(
            "some text".into(),
            embedding,
            Uuid::new_v4(),
            Uuid::new_v4(),
            HashMap::new(),
        )
    }

    #[test]
    fn test_put_get_roundtrip_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        let c = chunk(vec![0.1, 0.2, 0.3]);
        store.put(&c).unwrap();

        let loaded = store.get(&c.id).unwrap();
        assert_eq!(
            serde_json::to_string(&loaded).unwrap(),
            serde_json::to_string(&c).unwrap()
        );
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Library> = RecordStore::open(dir.path()).unwrap();
        let err = store.get(&Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_put_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        let mut c = chunk(vec![1.0]);
        store.put(&c).unwrap();
        c.content = "revised".into();
        store.put(&c).unwrap();

        assert_eq!(store.get(&c.id).unwrap().content, "revised");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_delete_then_delete_again() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        let c = chunk(vec![1.0]);
        store.put(&c).unwrap();

        store.delete(&c.id).unwrap();
        assert!(!store.exists(&c.id));
        // Second delete reports NotFound but leaves the same end state.
        let err = store.delete(&c.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_list_ids_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        let c = chunk(vec![1.0]);
        store.put(&c).unwrap();

        // A half-written temp file and a non-uuid json file must be invisible.
        std::fs::write(dir.path().join("deadbeef.json.tmp"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.json"), b"{}").unwrap();

        assert_eq!(store.list_ids().unwrap(), vec![c.id]);
    }

    #[test]
    fn test_load_all_skips_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        let a = chunk(vec![1.0]);
        let b = chunk(vec![2.0]);
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        // Corrupt one file in place; load_all should return the other.
        std::fs::write(dir.path().join(format!("{}.json", a.id)), b"not json").unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, b.id);
    }

    #[test]
    fn test_ids_sorted_for_determinism() {
        let dir = TempDir::new().unwrap();
        let store: RecordStore<Chunk> = RecordStore::open(dir.path()).unwrap();
        for _ in 0..8 {
            store.put(&chunk(vec![1.0])).unwrap();
        }
        let ids = store.list_ids().unwrap();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
