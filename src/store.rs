// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document store seam: point-in-time snapshot fetches.
//!
//! The store holds the durable documents that subscriptions track. One
//! fetch happens per subscription, after the channel subscribe is
//! acknowledged, and establishes the baseline every later change op is
//! relative to.
//!
//! # Field Selectors
//!
//! Fetches honor a Mongo-style projection (see
//! [`FieldSelector`](crate::metadata::FieldSelector)): `true` entries
//! select the fields to include, `false` entries the fields to exclude,
//! and an empty selector returns the whole document. Mixing include and
//! exclude entries treats the selector as an inclusion list.

use crate::error::BoxFuture;
use crate::metadata::FieldSelector;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A stored document. Opaque structured data.
pub type Document = serde_json::Value;

/// Trait defining what we need from the document store.
///
/// This trait allows testing with mocks and decouples us from any concrete
/// database.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch one document by id, honoring the field selector.
    ///
    /// Returns `Ok(None)` when the document does not exist - callers
    /// treat that as a distinct, application-visible condition, never as
    /// an empty document.
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        selector: &FieldSelector,
    ) -> BoxFuture<'_, Option<Document>>;
}

/// Apply a field selector to a document.
///
/// Non-object documents pass through untouched; projections only make
/// sense on objects.
pub fn apply_selector(document: &Document, selector: &FieldSelector) -> Document {
    if selector.is_empty() {
        return document.clone();
    }
    let Some(object) = document.as_object() else {
        return document.clone();
    };

    let includes: Vec<&String> = selector
        .iter()
        .filter_map(|(field, &include)| include.then_some(field))
        .collect();

    let projected: serde_json::Map<String, Document> = if includes.is_empty() {
        // Pure exclusion projection
        object
            .iter()
            .filter(|(field, _)| selector.get(*field) != Some(&false))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    } else {
        object
            .iter()
            .filter(|(field, _)| includes.iter().any(|inc| *inc == *field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    };

    Document::Object(projected)
}

/// In-memory document store for testing and standalone use.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub async fn insert(&self, collection: &str, id: &str, document: Document) {
        self.documents
            .write()
            .await
            .insert((collection.to_string(), id.to_string()), document);
    }

    /// Remove a document.
    pub async fn remove(&self, collection: &str, id: &str) {
        self.documents
            .write()
            .await
            .remove(&(collection.to_string(), id.to_string()));
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        selector: &FieldSelector,
    ) -> BoxFuture<'_, Option<Document>> {
        let key = (collection.to_string(), id.to_string());
        let selector = selector.clone();
        Box::pin(async move {
            let documents = self.documents.read().await;
            Ok(documents
                .get(&key)
                .map(|document| apply_selector(document, &selector)))
        })
    }
}
