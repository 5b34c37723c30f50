// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Subscription metadata: what document a subscription id refers to.
//!
//! A subscription id is an opaque key. The metadata store maps it to a
//! [`Metadata`] record naming the target document, the collection holding
//! it, and an optional field selector restricting the snapshot fetch.
//! Resolution happens exactly once per subscription, during the
//! `Discovering` state; the record is immutable afterward.
//!
//! # Wire Format
//!
//! Records are stored as compact JSON with single-letter keys:
//!
//! ```json
//! { "i": "doc1", "f": { "name": true }, "c": "users" }
//! ```
//!
//! `f` is optional and defaults to the empty selector (fetch all fields).
//! Long-form keys (`documentId`, `fields`, `collection`) are accepted as
//! aliases.

use crate::error::{BackendError, BoxFuture, Result, SubscriptionError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Restriction on which document fields the snapshot fetch returns.
///
/// Mongo-style projection: `{"field": true}` entries select fields to
/// include, `{"field": false}` entries select fields to exclude. Empty
/// means the whole document.
pub type FieldSelector = BTreeMap<String, bool>;

/// Resolved subscription metadata.
///
/// Produced by parsing the metadata store record for a subscription id.
/// Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Id of the document this subscription tracks.
    #[serde(rename = "i", alias = "documentId")]
    pub document_id: String,

    /// Field selector applied to the snapshot fetch. Empty = all fields.
    #[serde(rename = "f", alias = "fields", default)]
    pub field_selector: FieldSelector,

    /// Collection the document lives in.
    #[serde(rename = "c", alias = "collection")]
    pub collection: String,
}

impl Metadata {
    /// Parse a raw metadata record body.
    ///
    /// The record must be a JSON object in the wire format above. Parse
    /// failure is a fatal [`SubscriptionError::MetadataParse`].
    pub fn from_bytes(id: &str, raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|source| SubscriptionError::MetadataParse {
            id: id.to_string(),
            source,
        })
    }
}

/// Trait defining what we need from the key/metadata store.
///
/// One lookup call per subscription. The store returns the raw record
/// body; parsing (and the parse error taxonomy) stays in this crate.
///
/// This trait allows testing with mocks and decouples us from any concrete
/// key/value backend.
pub trait MetadataStore: Send + Sync + 'static {
    /// Fetch the raw metadata record for a subscription id.
    ///
    /// A missing record is a lookup failure, not an empty result.
    fn get(&self, id: &str) -> BoxFuture<'_, Vec<u8>>;
}

/// In-memory metadata store for testing and standalone use.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a metadata record for an id, serialized in the wire format.
    pub async fn insert(&self, id: &str, metadata: &Metadata) {
        let raw = serde_json::to_vec(metadata).expect("metadata serializes");
        self.records.write().await.insert(id.to_string(), raw);
    }

    /// Store a raw record body verbatim (for malformed-record scenarios).
    pub async fn insert_raw(&self, id: &str, raw: Vec<u8>) {
        self.records.write().await.insert(id.to_string(), raw);
    }

    /// Remove a record.
    pub async fn remove(&self, id: &str) {
        self.records.write().await.remove(id);
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Vec<u8>> {
        let id = id.to_string();
        Box::pin(async move {
            let records = self.records.read().await;
            records
                .get(&id)
                .cloned()
                .ok_or_else(|| BackendError(format!("no metadata record for \"{id}\"")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_keys() {
        let raw = br#"{"i": "doc1", "f": {"name": true}, "c": "users"}"#;
        let meta = Metadata::from_bytes("sub-1", raw).unwrap();
        assert_eq!(meta.document_id, "doc1");
        assert_eq!(meta.collection, "users");
        assert_eq!(meta.field_selector.get("name"), Some(&true));
    }

    #[test]
    fn test_parse_long_key_aliases() {
        let raw = br#"{"documentId": "doc1", "fields": {}, "collection": "users"}"#;
        let meta = Metadata::from_bytes("sub-1", raw).unwrap();
        assert_eq!(meta.document_id, "doc1");
        assert_eq!(meta.collection, "users");
    }

    #[test]
    fn test_missing_selector_defaults_to_empty() {
        let raw = br#"{"i": "doc1", "c": "users"}"#;
        let meta = Metadata::from_bytes("sub-1", raw).unwrap();
        assert!(meta.field_selector.is_empty());
    }

    #[test]
    fn test_parse_failure_is_metadata_parse() {
        let err = Metadata::from_bytes("sub-1", b"not json").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.kind(), "metadata_parse");
        assert!(err.to_string().contains("sub-1"));
    }

    #[test]
    fn test_missing_required_field_fails() {
        let err = Metadata::from_bytes("sub-1", br#"{"i": "doc1"}"#).unwrap_err();
        assert_eq!(err.kind(), "metadata_parse");
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = InMemoryMetadataStore::new();
        let meta = Metadata {
            document_id: "doc1".to_string(),
            field_selector: FieldSelector::new(),
            collection: "users".to_string(),
        };
        store.insert("sub-1", &meta).await;

        let raw = store.get("sub-1").await.unwrap();
        let parsed = Metadata::from_bytes("sub-1", &raw).unwrap();
        assert_eq!(parsed, meta);
    }

    #[tokio::test]
    async fn test_in_memory_missing_record() {
        let store = InMemoryMetadataStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
