use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::errors::CoreError;

use super::traits::{DocumentStore, Snapshot, StoreEvent, SubscriptionHandle};

/// In-memory document store: the offline backend and the test double.
///
/// Collections are flat maps keyed by full path. Subscribers receive the
/// complete snapshot of their collection after every mutation, matching the
/// push semantics of the remote store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
}

struct Subscriber {
    id: u64,
    collection: String,
    sender: UnboundedSender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn snapshot_of(&self, collection: &str) -> Snapshot {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push the current snapshot to every subscriber of `collection`.
    /// Closed receivers are pruned on the way.
    fn notify(&mut self, collection: &str) {
        let snapshot = self.snapshot_of(collection);
        self.subscribers.retain(|s| !s.sender.is_closed());
        for subscriber in &self.subscribers {
            if subscriber.collection == collection {
                let _ = subscriber
                    .sender
                    .send(StoreEvent::Snapshot(snapshot.clone()));
            }
        }
    }
}

/// Split a document path into (collection path, document id).
fn split_doc_path(path: &str) -> Result<(&str, &str), CoreError> {
    path.rsplit_once('/')
        .ok_or_else(|| CoreError::Store(format!("invalid document path: {path}")))
}

/// Write `incoming`'s top-level fields into `target`, replacing per key.
fn merge_fields(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Add `delta` to the numeric field addressed by a dotted path, creating
/// intermediate maps as needed. A missing leaf starts from zero.
fn apply_increment(doc: &mut Value, field_path: &str, delta: i64) -> Result<(), CoreError> {
    let segments: Vec<&str> = field_path.split('.').collect();
    apply_increment_segments(doc, &segments, field_path, delta)
}

fn apply_increment_segments(
    current: &mut Value,
    segments: &[&str],
    field_path: &str,
    delta: i64,
) -> Result<(), CoreError> {
    let map = match current {
        Value::Object(map) => map,
        _ => {
            return Err(CoreError::Store(format!(
                "field path {field_path} does not address a map"
            )))
        }
    };
    let (segment, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => return Ok(()),
    };
    if rest.is_empty() {
        let slot = map.entry(segment.to_string()).or_insert(Value::from(0));
        let base = slot.as_i64().unwrap_or(0);
        *slot = Value::from(base + delta);
        Ok(())
    } else {
        let next = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        apply_increment_segments(next, rest, field_path, delta)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, CoreError> {
        let doc_id = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.clone(), data);
        inner.notify(collection);
        Ok(doc_id)
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(doc_id);
        }
        inner.notify(collection);
        Ok(())
    }

    async fn read_document(&self, path: &str) -> Result<Option<Value>, CoreError> {
        let (collection, doc_id) = split_doc_path(path)?;
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(doc_id))
            .cloned())
    }

    async fn merge_document(&self, path: &str, data: Value) -> Result<(), CoreError> {
        let (collection, doc_id) = split_doc_path(path)?;
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let doc = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .entry(doc_id.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        merge_fields(doc, data);
        inner.notify(collection);
        Ok(())
    }

    async fn increment_fields(
        &self,
        path: &str,
        deltas: &[(&str, i64)],
    ) -> Result<(), CoreError> {
        let (collection, doc_id) = split_doc_path(path)?;
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(doc_id))
            .ok_or_else(|| CoreError::DocumentNotFound(path.to_string()))?;
        for (field_path, delta) in deltas {
            apply_increment(doc, field_path, *delta)?;
        }
        inner.notify(collection);
        Ok(())
    }

    fn subscribe_collection(
        &self,
        collection: &str,
        events: UnboundedSender<StoreEvent>,
    ) -> SubscriptionHandle {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => {
                let _ = events.send(StoreEvent::Error("store lock poisoned".into()));
                return SubscriptionHandle::new(|| {});
            }
        };
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;

        // Deliver the current contents right away, like the remote store does.
        let _ = events.send(StoreEvent::Snapshot(inner.snapshot_of(collection)));

        inner.subscribers.push(Subscriber {
            id,
            collection: collection.to_string(),
            sender: events,
        });

        let registry = Arc::clone(&self.inner);
        SubscriptionHandle::new(move || {
            if let Ok(mut inner) = registry.lock() {
                inner.subscribers.retain(|s| s.id != id);
            }
        })
    }
}

fn poisoned() -> CoreError {
    CoreError::Store("store lock poisoned".into())
}
