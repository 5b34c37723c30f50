//! Mock collaborators for integration tests.
//!
//! Records all subscribe/unsubscribe/lookup/fetch calls for assertions.
//! Configurable failure injection for each collaborator, plus gating:
//! a gated store blocks its call until [`release()`] fires, which is how
//! tests control the race between message arrival and fetch completion
//! deterministically.
//!
//! [`release()`]: GatedDocumentStore::release

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use subscription_engine::{
    apply_selector, BackendError, BoxFuture, Document, DocumentStore, FieldSelector, Metadata,
    MetadataStore, PubSub, RawMessage,
};
use tokio::sync::{broadcast, Semaphore};

// =============================================================================
// Metadata store
// =============================================================================

/// Mock metadata store with optional gating and failure injection.
pub struct MockMetadataStore {
    records: HashMap<String, Vec<u8>>,
    lookups: Mutex<Vec<String>>,
    fail: AtomicBool,
    gated: bool,
    gate: Semaphore,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            lookups: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            gated: false,
            gate: Semaphore::new(0),
        }
    }

    /// Store a record for `id` in the wire format.
    pub fn with_record(mut self, id: &str, metadata: &Metadata) -> Self {
        let raw = serde_json::to_vec(metadata).expect("metadata serializes");
        self.records.insert(id.to_string(), raw);
        self
    }

    /// Store a raw record body verbatim (malformed-record scenarios).
    pub fn with_raw_record(mut self, id: &str, raw: &[u8]) -> Self {
        self.records.insert(id.to_string(), raw.to_vec());
        self
    }

    /// Every lookup fails with a transport-style error.
    pub fn failing() -> Self {
        let store = Self::new();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    /// Lookups block until [`release()`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Unblock one pending (or future) lookup.
    #[allow(dead_code)] // Not every test releases the gate
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Ids looked up so far.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl MetadataStore for MockMetadataStore {
    fn get(&self, id: &str) -> BoxFuture<'_, Vec<u8>> {
        let id = id.to_string();
        Box::pin(async move {
            self.lookups.lock().unwrap().push(id.clone());
            if self.gated {
                self.gate.acquire().await.expect("gate open").forget();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackendError("metadata store unavailable".to_string()));
            }
            self.records
                .get(&id)
                .cloned()
                .ok_or_else(|| BackendError(format!("no metadata record for \"{id}\"")))
        })
    }
}

// =============================================================================
// Pub/sub transport
// =============================================================================

/// Mock pub/sub bus that records subscribe/unsubscribe calls.
pub struct MockPubSub {
    tx: broadcast::Sender<RawMessage>,
    subscribes: Mutex<Vec<String>>,
    unsubscribes: Mutex<Vec<String>>,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
}

impl MockPubSub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            subscribes: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
            fail_subscribe: AtomicBool::new(false),
            fail_unsubscribe: AtomicBool::new(false),
        }
    }

    /// Every subscribe call fails.
    pub fn failing_subscribe() -> Self {
        let bus = Self::new();
        bus.fail_subscribe.store(true, Ordering::SeqCst);
        bus
    }

    /// Every unsubscribe call fails.
    pub fn failing_unsubscribe() -> Self {
        let bus = Self::new();
        bus.fail_unsubscribe.store(true, Ordering::SeqCst);
        bus
    }

    /// Publish a JSON value on a channel.
    pub fn publish_json(&self, channel: &str, value: &serde_json::Value) {
        let body = serde_json::to_vec(value).expect("value serializes");
        self.publish_raw(channel, body);
    }

    /// Publish raw bytes on a channel.
    pub fn publish_raw(&self, channel: &str, body: impl Into<Vec<u8>>) {
        let _ = self.tx.send(RawMessage::new(channel, body));
    }

    /// Channels subscribed so far.
    pub fn subscribed(&self) -> Vec<String> {
        self.subscribes.lock().unwrap().clone()
    }

    /// Channels unsubscribed so far.
    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribes.lock().unwrap().clone()
    }
}

impl PubSub for MockPubSub {
    fn subscribe(&self, channel: &str) -> BoxFuture<'_, ()> {
        let channel = channel.to_string();
        Box::pin(async move {
            self.subscribes.lock().unwrap().push(channel.clone());
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(BackendError(format!("subscribe \"{channel}\" refused")));
            }
            Ok(())
        })
    }

    fn unsubscribe(&self, channel: &str) -> BoxFuture<'_, ()> {
        let channel = channel.to_string();
        Box::pin(async move {
            self.unsubscribes.lock().unwrap().push(channel.clone());
            if self.fail_unsubscribe.load(Ordering::SeqCst) {
                return Err(BackendError(format!("unsubscribe \"{channel}\" refused")));
            }
            Ok(())
        })
    }

    fn messages(&self) -> broadcast::Receiver<RawMessage> {
        self.tx.subscribe()
    }
}

// =============================================================================
// Document store
// =============================================================================

/// A recorded fetch call.
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub collection: String,
    pub document_id: String,
    pub selector: FieldSelector,
}

/// Mock document store with optional gating and failure injection.
///
/// When gated, `find_by_id` blocks until [`release()`](Self::release),
/// letting tests decide exactly when the snapshot fetch resolves
/// relative to message arrival and teardown.
pub struct GatedDocumentStore {
    documents: Mutex<HashMap<(String, String), Document>>,
    calls: Mutex<Vec<FetchCall>>,
    fail: AtomicBool,
    gated: bool,
    gate: Semaphore,
}

impl GatedDocumentStore {
    /// Ungated store: fetches resolve immediately.
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            gated: false,
            gate: Semaphore::new(0),
        }
    }

    /// Gated store: fetches block until released.
    pub fn gated() -> Self {
        let mut store = Self::new();
        store.gated = true;
        store
    }

    pub fn with_document(self, collection: &str, id: &str, document: Document) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), document);
        self
    }

    /// Every fetch fails with a transport-style error.
    pub fn failing() -> Self {
        let store = Self::new();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    /// Unblock one pending (or future) fetch.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Fetch calls recorded so far.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentStore for GatedDocumentStore {
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        selector: &FieldSelector,
    ) -> BoxFuture<'_, Option<Document>> {
        let call = FetchCall {
            collection: collection.to_string(),
            document_id: id.to_string(),
            selector: selector.clone(),
        };
        Box::pin(async move {
            self.calls.lock().unwrap().push(call.clone());
            if self.gated {
                self.gate.acquire().await.expect("gate open").forget();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackendError("document store unavailable".to_string()));
            }
            let documents = self.documents.lock().unwrap();
            Ok(documents
                .get(&(call.collection.clone(), call.document_id.clone()))
                .map(|document| apply_selector(document, &call.selector)))
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Metadata for the canonical `users.doc1` test document, no selector.
pub fn users_metadata() -> Metadata {
    Metadata {
        document_id: "doc1".to_string(),
        field_selector: FieldSelector::new(),
        collection: "users".to_string(),
    }
}
