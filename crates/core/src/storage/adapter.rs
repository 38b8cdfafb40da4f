use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::errors::CoreError;
use crate::models::entry::{LedgerEntry, StoredEntry, SENTINEL_DATE};
use crate::models::summary::SummaryCounter;

use super::traits::{DocumentStore, Snapshot, StoreEvent, SubscriptionHandle};

/// How user data is laid out in the document store. Two deployments exist:
/// dedicated projects keep user data at the root, shared ones nest it under
/// an application namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionLayout {
    /// `users/{uid}/…`
    Dedicated,
    /// `artifacts/{app_id}/users/{uid}/…`
    Shared { app_id: String },
}

impl CollectionLayout {
    /// Collection holding a user's ledger entries.
    pub fn entries_collection(&self, uid: &str) -> String {
        match self {
            CollectionLayout::Dedicated => format!("users/{uid}/trades"),
            CollectionLayout::Shared { app_id } => {
                format!("artifacts/{app_id}/users/{uid}/trades")
            }
        }
    }

    /// Document holding a user's summary counter.
    pub fn summary_doc(&self, uid: &str) -> String {
        match self {
            CollectionLayout::Dedicated => format!("users/{uid}/meta/summary"),
            CollectionLayout::Shared { app_id } => {
                format!("artifacts/{app_id}/users/{uid}/meta/summary")
            }
        }
    }
}

/// Normalize an arbitrary stored date value to `YYYY-MM-DD`.
///
/// Strings already carrying an ISO date prefix pass through unchanged; store
/// timestamps (`{"seconds": …}`) convert to their UTC calendar date; any
/// other value is stringified and scanned for an embedded date. Anything
/// unrecognizable falls back to the epoch sentinel instead of failing,
/// trading precision for availability.
pub fn normalize_date(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if starts_with_iso_date(s) {
                s.clone()
            } else {
                extract_iso_date(s).unwrap_or_else(|| SENTINEL_DATE.to_string())
            }
        }
        Value::Object(map) => {
            if let Some(date) = map
                .get("seconds")
                .and_then(Value::as_i64)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
            {
                return date;
            }
            extract_iso_date(&value.to_string()).unwrap_or_else(|| SENTINEL_DATE.to_string())
        }
        other => {
            extract_iso_date(&other.to_string()).unwrap_or_else(|| SENTINEL_DATE.to_string())
        }
    }
}

fn is_iso_date(b: &[u8]) -> bool {
    b.len() == 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

fn starts_with_iso_date(s: &str) -> bool {
    s.len() >= 10 && is_iso_date(&s.as_bytes()[..10])
}

/// Find a `YYYY-MM-DD`-shaped substring anywhere in `s`.
fn extract_iso_date(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    bytes
        .windows(10)
        .position(is_iso_date)
        .map(|start| s[start..start + 10].to_string())
}

/// Durable storage of ledger entries plus the best-effort summary counter.
///
/// The entry log is authoritative. The counter only exists so "how many
/// trades total / on date D" never needs a full scan; its increments and
/// decrements are best-effort, and the reconciliation pass that runs on
/// every snapshot delivery overwrites whatever drift they accumulated.
pub struct LedgerStore {
    store: Arc<dyn DocumentStore>,
    layout: CollectionLayout,
    subscription: Option<SubscriptionHandle>,
}

/// One delivery from a live subscription: the full date-sorted snapshot and
/// the (possibly just-reconciled) counter.
#[derive(Debug, Clone)]
pub struct LedgerUpdate {
    /// All entries, ascending by date, then by entry id for same-day order
    pub entries: Vec<StoredEntry>,
    /// `None` when the counter could not be read; the entries stand alone
    pub counter: Option<SummaryCounter>,
}

impl LedgerStore {
    pub fn new(store: Arc<dyn DocumentStore>, layout: CollectionLayout) -> Self {
        Self {
            store,
            layout,
            subscription: None,
        }
    }

    /// Persist a new entry, then bump the summary counter.
    ///
    /// The entry write is authoritative and is never rolled back: once it
    /// succeeds, any counter failure is absorbed here and left for the next
    /// reconciliation pass to heal. Returns the store-assigned document id.
    pub async fn add_entry(&self, uid: &str, mut entry: LedgerEntry) -> Result<String, CoreError> {
        entry.date = normalize_date(&Value::String(std::mem::take(&mut entry.date)));
        let collection = self.layout.entries_collection(uid);
        let data = serde_json::to_value(&entry)
            .map_err(|e| CoreError::Serialization(format!("Failed to encode entry: {e}")))?;

        let doc_id = self.store.create_document(&collection, data).await?;
        self.record_added(uid, &entry.date).await;
        Ok(doc_id)
    }

    /// Delete an entry by document id.
    ///
    /// When the caller cannot supply the entry, it is read back first to
    /// discover its date — without it the right count bucket cannot be
    /// decremented. Only the delete itself can fail the operation; the
    /// counter decrement is best-effort.
    pub async fn delete_entry(
        &self,
        uid: &str,
        doc_id: &str,
        known_entry: Option<&LedgerEntry>,
    ) -> Result<(), CoreError> {
        let collection = self.layout.entries_collection(uid);
        let doc_path = format!("{collection}/{doc_id}");

        let raw_date = match known_entry {
            Some(entry) => Some(Value::String(entry.date.clone())),
            None => match self.store.read_document(&doc_path).await {
                Ok(Some(doc)) => doc.get("date").cloned(),
                Ok(None) => None,
                Err(err) => {
                    warn!("could not read entry {doc_id} before delete: {err}");
                    None
                }
            },
        };

        self.store.delete_document(&collection, doc_id).await?;

        if let Some(raw) = raw_date {
            self.record_removed(uid, &normalize_date(&raw)).await;
        }
        Ok(())
    }

    /// Delete every supplied entry concurrently, then zero the counter.
    ///
    /// Individual delete failures never prevent the counter reset from being
    /// attempted; the first one is still surfaced to the caller afterwards,
    /// since entry deletes are primary-path operations.
    pub async fn reset_all(&self, uid: &str, entries: &[StoredEntry]) -> Result<(), CoreError> {
        let deletes = entries
            .iter()
            .map(|stored| self.delete_entry(uid, &stored.doc_id, Some(&stored.entry)));

        let mut first_failure = None;
        for result in join_all(deletes).await {
            if let Err(err) = result {
                warn!("reset: failed to delete an entry for {uid}: {err}");
                first_failure.get_or_insert(err);
            }
        }

        let reset = json!({ "totalTrades": 0, "counts": {} });
        if let Err(err) = self.store.merge_document(&self.layout.summary_doc(uid), reset).await {
            error!("failed to reset summary counter for {uid}: {err}");
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Establish the live subscription for `uid`, replacing any prior one.
    ///
    /// The previous subscription is torn down before the new one attaches,
    /// so at most one is active per adapter and nothing is delivered twice.
    pub fn subscribe(&mut self, uid: &str) -> LedgerSubscription {
        self.subscription = None;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self
            .store
            .subscribe_collection(&self.layout.entries_collection(uid), tx);
        self.subscription = Some(handle);

        LedgerSubscription {
            store: Arc::clone(&self.store),
            summary_path: self.layout.summary_doc(uid),
            events: rx,
        }
    }

    /// Tear down the active subscription, if any.
    pub fn unsubscribe(&mut self) {
        self.subscription = None;
    }

    /// Best-effort `+1` after an entry write. When the counter document does
    /// not exist yet the increment fails and the counter is seeded from
    /// scratch. Failures never surface: the entry is already durable.
    async fn record_added(&self, uid: &str, date: &str) {
        let path = self.layout.summary_doc(uid);
        let date_key = if date.is_empty() { SENTINEL_DATE } else { date };
        let counts_field = format!("counts.{date_key}");

        let deltas = [("totalTrades", 1), (counts_field.as_str(), 1)];
        if let Err(err) = self.store.increment_fields(&path, &deltas).await {
            debug!("counter increment failed, seeding summary doc: {err}");
            let seed = json!({
                "totalTrades": 1,
                "counts": { date_key: 1 },
                "lastUpdated": Utc::now().to_rfc3339(),
            });
            if let Err(err) = self.store.merge_document(&path, seed).await {
                error!("failed to seed summary counter for {uid}: {err}");
            }
        }
    }

    /// Best-effort `-1` after a delete. A missing counter or a lost write is
    /// tolerated; reconciliation restores the true counts.
    async fn record_removed(&self, uid: &str, date: &str) {
        let path = self.layout.summary_doc(uid);
        let date_key = if date.is_empty() { SENTINEL_DATE } else { date };
        let counts_field = format!("counts.{date_key}");

        let deltas = [("totalTrades", -1), (counts_field.as_str(), -1)];
        if let Err(err) = self.store.increment_fields(&path, &deltas).await {
            warn!("counter decrement failed for {uid}: {err}");
        }
    }
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("layout", &self.layout)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

/// Live view over a user's ledger. Await [`LedgerSubscription::next`] to
/// receive snapshots; the stream ends when the adapter re-subscribes or
/// unsubscribes.
pub struct LedgerSubscription {
    store: Arc<dyn DocumentStore>,
    summary_path: String,
    events: UnboundedReceiver<StoreEvent>,
}

impl LedgerSubscription {
    /// Wait for the next snapshot delivery.
    ///
    /// Stream failures surface as `Err` items, distinct from data; the core
    /// does not reconnect — that policy belongs to the caller.
    pub async fn next(&mut self) -> Option<Result<LedgerUpdate, CoreError>> {
        match self.events.recv().await? {
            StoreEvent::Error(message) => Some(Err(CoreError::Subscription(message))),
            StoreEvent::Snapshot(snapshot) => Some(Ok(self.reconcile(snapshot).await)),
        }
    }

    /// Decode and sort a raw snapshot, then heal the stored counter if it
    /// disagrees with a recomputation from the full entry set.
    ///
    /// This is the real consistency mechanism: however many best-effort
    /// increments were lost or interleaved, one pass here restores the
    /// counter invariant exactly.
    async fn reconcile(&self, snapshot: Snapshot) -> LedgerUpdate {
        let mut entries: Vec<StoredEntry> = snapshot
            .into_iter()
            .map(|(doc_id, doc)| StoredEntry {
                entry: decode_entry(&doc),
                doc_id,
            })
            .collect();
        entries.sort_by(|a, b| {
            a.entry
                .date
                .cmp(&b.entry.date)
                .then(a.entry.id.cmp(&b.entry.id))
        });

        let fresh = SummaryCounter::from_entries(entries.iter().map(|s| &s.entry));

        let stored = match self.store.read_document(&self.summary_path).await {
            Ok(Some(doc)) => match serde_json::from_value::<SummaryCounter>(doc) {
                Ok(counter) => Some(counter),
                Err(err) => {
                    warn!("summary counter document is malformed: {err}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                // The counter is an optimization; the snapshot still stands.
                error!("failed to read summary counter: {err}");
                return LedgerUpdate {
                    entries,
                    counter: None,
                };
            }
        };

        match stored {
            Some(counter) if !counter.is_stale(&fresh) => LedgerUpdate {
                entries,
                counter: Some(counter),
            },
            _ => {
                let healed = SummaryCounter {
                    last_updated: Some(Utc::now().to_rfc3339()),
                    ..fresh
                };
                match serde_json::to_value(&healed) {
                    Ok(doc) => {
                        if let Err(err) = self.store.merge_document(&self.summary_path, doc).await
                        {
                            error!("failed to write reconciled summary counter: {err}");
                        }
                    }
                    Err(err) => error!("failed to encode summary counter: {err}"),
                }
                LedgerUpdate {
                    entries,
                    counter: Some(healed),
                }
            }
        }
    }
}

/// Decode a stored document into an entry, tolerating missing or malformed
/// fields — one corrupt record degrades locally instead of poisoning the
/// whole snapshot.
fn decode_entry(doc: &Value) -> LedgerEntry {
    LedgerEntry {
        id: doc.get("id").and_then(Value::as_i64).unwrap_or(0),
        date: doc
            .get("date")
            .map(normalize_date)
            .unwrap_or_else(|| SENTINEL_DATE.to_string()),
        asset: doc
            .get("asset")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        entry_type: doc
            .get("type")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        amount: doc.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
        timestamp: doc
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}
