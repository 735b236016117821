//! Core record types for shelfdb.
//!
//! Three record kinds form a containment hierarchy: a `Library` holds
//! `Document`s, a `Document` holds `Chunk`s, and only chunks carry an
//! embedding. All kinds share an id, arbitrary key-value metadata, and
//! creation/update timestamps; the [`Record`] trait gives the collection
//! layer uniform access to those fields.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A typed metadata value attached to a record.
///
/// Used for metadata filtering in search queries (e.g., `eq`, `gt`, `in`
/// operators). Serialized untagged so JSON payloads read naturally
/// (`{"lang": "en", "page": 3}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

/// Uniform access to the fields the storage and index layers need.
///
/// Implemented by all three record kinds. `embedding` returns `None` for
/// kinds that carry no vector; such records are simply skipped by the
/// similarity indexes.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique record id; doubles as the storage filename stem.
    fn id(&self) -> Uuid;

    /// The record's embedding vector, if it has one.
    fn embedding(&self) -> Option<&[f32]> {
        None
    }

    /// Key-value metadata used by search filters.
    fn metadata(&self) -> &HashMap<String, MetadataValue>;

    /// Bump `updated_at` to now. Called by the collection on update.
    fn touch(&mut self);
}

/// Root of the containment hierarchy: a named group of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Library {
    /// Creates a library with a random id and fresh timestamps.
    pub fn new(name: String, metadata: HashMap<String, MetadataValue>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Library {
    fn id(&self) -> Uuid {
        self.id
    }

    fn metadata(&self) -> &HashMap<String, MetadataValue> {
        &self.metadata
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A named group of chunks within a library.
///
/// Documents do not embed their chunks; chunks reference their parent by
/// `document_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub library_id: Uuid,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a document with a random id and fresh timestamps.
    pub fn new(name: String, library_id: Uuid, metadata: HashMap<String, MetadataValue>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            library_id,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Document {
    fn id(&self) -> Uuid {
        self.id
    }

    fn metadata(&self) -> &HashMap<String, MetadataValue> {
        &self.metadata
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The smallest indexed unit: a piece of text with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub document_id: Uuid,
    pub library_id: Uuid,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chunk {
    /// Creates a chunk with a random id and fresh timestamps.
    pub fn new(
        content: String,
        embedding: Vec<f32>,
        document_id: Uuid,
        library_id: Uuid,
        metadata: HashMap<String, MetadataValue>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content,
            embedding,
            document_id,
            library_id,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Chunk {
    fn id(&self) -> Uuid {
        self.id
    }

    fn embedding(&self) -> Option<&[f32]> {
        Some(&self.embedding)
    }

    fn metadata(&self) -> &HashMap<String, MetadataValue> {
        &self.metadata
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_exposes_embedding() {
        let chunk = Chunk::new(
            "hello".into(),
            vec![1.0, 0.0],
            Uuid::new_v4(),
            Uuid::new_v4(),
            HashMap::new(),
        );
        assert_eq!(chunk.embedding(), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_library_and_document_have_no_embedding() {
        let lib = Library::new("lib".into(), HashMap::new());
        let doc = Document::new("doc".into(), lib.id, HashMap::new());
        assert!(lib.embedding().is_none());
        assert!(doc.embedding().is_none());
    }

    #[test]
    fn test_touch_bumps_updated_at_only() {
        let mut lib = Library::new("lib".into(), HashMap::new());
        let created = lib.created_at;
        let before = lib.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        lib.touch();
        assert_eq!(lib.created_at, created);
        assert!(lib.updated_at > before);
    }

    #[test]
    fn test_metadata_value_json_shape() {
        let mut metadata = HashMap::new();
        metadata.insert("lang".to_string(), MetadataValue::String("en".into()));
        metadata.insert("page".to_string(), MetadataValue::Integer(3));
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["lang"], serde_json::json!("en"));
        assert_eq!(json["page"], serde_json::json!(3));
    }

    #[test]
    fn test_metadata_value_roundtrip() {
        let values = vec![
            MetadataValue::Boolean(true),
            MetadataValue::Integer(-7),
            MetadataValue::Float(0.25),
            MetadataValue::String("x".into()),
        ];
        for v in values {
            let json = serde_json::to_string(&v).unwrap();
            let back: MetadataValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
    }
}
