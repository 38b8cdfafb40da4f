use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::CoreError;

/// Full contents of a collection at one instant: (document id, document).
pub type Snapshot = Vec<(String, Value)>;

/// A change notification pushed to a collection subscriber.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The complete, internally consistent contents of the collection.
    Snapshot(Snapshot),
    /// The stream failed; no further snapshots will arrive.
    Error(String),
}

/// Owned handle for a live collection subscription.
///
/// Dropping the handle detaches the subscriber. Replacing a stored handle is
/// how a consumer swaps to a new subscription without leaking the old one.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle").finish_non_exhaustive()
    }
}

/// Trait abstraction for the document-oriented persistence boundary.
///
/// Each backend (in-memory, remote) implements these six primitives; the
/// ledger adapter is written against the trait so a backend swap touches
/// nothing else. Collections and documents are addressed by `/`-separated
/// path strings; a document path is its collection path plus the document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id. Returns the new id.
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, CoreError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), CoreError>;

    /// Read a document once. `Ok(None)` when it does not exist.
    async fn read_document(&self, path: &str) -> Result<Option<Value>, CoreError>;

    /// Write top-level fields into a document, replacing existing values for
    /// those fields and leaving the rest untouched. Creates the document
    /// when it does not exist.
    async fn merge_document(&self, path: &str, data: Value) -> Result<(), CoreError>;

    /// Atomically add deltas to numeric fields. Dotted paths address nested
    /// maps (`counts.2024-01-02`); missing leaves start from zero. Fails
    /// with [`CoreError::DocumentNotFound`] when the document itself is
    /// missing — callers fall back to creating it.
    async fn increment_fields(
        &self,
        path: &str,
        deltas: &[(&str, i64)],
    ) -> Result<(), CoreError>;

    /// Subscribe to a collection. The current snapshot is delivered
    /// immediately, then again after every change, until the returned
    /// handle is dropped.
    fn subscribe_collection(
        &self,
        collection: &str,
        events: UnboundedSender<StoreEvent>,
    ) -> SubscriptionHandle;
}
