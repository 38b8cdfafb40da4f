pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::sync::Arc;

use errors::CoreError;
use models::chart::ChartWindow;
use models::entry::{EntryType, LedgerEntry, StoredEntry};
use models::summary::{LedgerSummary, SummaryCounter};
use services::aggregation_service::AggregationService;
use services::chart_service::ChartService;
use storage::adapter::{CollectionLayout, LedgerStore, LedgerSubscription, LedgerUpdate};
use storage::csv;
use storage::traits::DocumentStore;

/// Main entry point for the Trade Journal core library.
/// Owns the ledger store adapter, the derived-statistics services, and the
/// live snapshot delivered by the active subscription.
#[must_use]
pub struct TradeJournal {
    store: LedgerStore,
    aggregation_service: AggregationService,
    chart_service: ChartService,
    entries: Vec<StoredEntry>,
    counter: Option<SummaryCounter>,
}

impl std::fmt::Debug for TradeJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeJournal")
            .field("entries", &self.entries.len())
            .field("total_trades", &self.total_trades())
            .finish()
    }
}

impl TradeJournal {
    /// Create a journal on top of any document store backend.
    pub fn new(store: Arc<dyn DocumentStore>, layout: CollectionLayout) -> Self {
        Self {
            store: LedgerStore::new(store, layout),
            aggregation_service: AggregationService::new(),
            chart_service: ChartService::new(),
            entries: Vec::new(),
            counter: None,
        }
    }

    // ── Live Snapshot ───────────────────────────────────────────────

    /// Subscribe to live updates for `uid`, replacing any prior
    /// subscription. Drive the returned stream and feed each delivered
    /// update to [`apply_update`](Self::apply_update).
    pub fn subscribe(&mut self, uid: &str) -> LedgerSubscription {
        self.store.subscribe(uid)
    }

    /// Install a delivered snapshot as the current view of the ledger.
    pub fn apply_update(&mut self, update: LedgerUpdate) {
        self.entries = update.entries;
        self.counter = update.counter;
    }

    /// Tear down the active subscription, if any.
    pub fn unsubscribe(&mut self) {
        self.store.unsubscribe();
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Record a new ledger entry. Returns the persisted document id.
    ///
    /// The stored sign follows the type — WIN/DEPOSIT non-negative,
    /// LOSS/WITHDRAW negative — whatever sign the caller passed. Transfers
    /// always use the `CASH` asset.
    pub async fn add_trade(
        &self,
        uid: &str,
        date: &str,
        asset: &str,
        entry_type: EntryType,
        amount: f64,
    ) -> Result<String, CoreError> {
        if !amount.is_finite() {
            return Err(CoreError::ValidationError(
                "Amount must be a finite number".into(),
            ));
        }
        let mut amount = amount.abs();
        if matches!(entry_type, EntryType::Loss | EntryType::Withdraw) {
            amount = -amount;
        }
        let asset = if entry_type.is_transfer() { "CASH" } else { asset };

        let entry = LedgerEntry::new(date, asset, Some(entry_type), amount);
        self.store.add_entry(uid, entry).await
    }

    /// Delete an entry by its document id.
    /// The entry is resolved from the snapshot when possible, so the
    /// adapter can decrement the counter without a read-back.
    pub async fn delete_trade(&self, uid: &str, doc_id: &str) -> Result<(), CoreError> {
        let known = self
            .entries
            .iter()
            .find(|s| s.doc_id == doc_id)
            .map(|s| s.entry.clone());
        self.store.delete_entry(uid, doc_id, known.as_ref()).await
    }

    /// Delete every entry in the current snapshot and zero the counter.
    pub async fn reset(&self, uid: &str) -> Result<(), CoreError> {
        self.store.reset_all(uid, &self.entries).await
    }

    // ── Statistics & Chart ──────────────────────────────────────────

    /// Full derived statistics over the current snapshot.
    #[must_use]
    pub fn summary(&self) -> LedgerSummary {
        self.aggregation_service.compute_summary(&self.entries)
    }

    /// The chart window at the current page cursor.
    pub fn chart_window(&mut self) -> ChartWindow {
        let series = self.summary().series;
        self.chart_service.window(&series)
    }

    /// Navigate one window back in time (no-op at the oldest page).
    pub fn older_page(&mut self) -> ChartWindow {
        let series = self.summary().series;
        self.chart_service.older_page(&series)
    }

    /// Navigate one window toward the present (no-op at the latest page).
    pub fn newer_page(&mut self) -> ChartWindow {
        let series = self.summary().series;
        self.chart_service.newer_page(&series)
    }

    // ── Listings & Counts ───────────────────────────────────────────

    /// Entries for display, newest first (creation order, not date order).
    #[must_use]
    pub fn entries(&self) -> Vec<&StoredEntry> {
        let mut entries: Vec<&StoredEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.entry.id.cmp(&a.entry.id));
        entries
    }

    /// The snapshot in delivery order (ascending by date).
    #[must_use]
    pub fn snapshot(&self) -> &[StoredEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total WIN/LOSS count without scanning the ledger: the derived
    /// counter when one was delivered, a snapshot recount otherwise.
    #[must_use]
    pub fn total_trades(&self) -> i64 {
        match &self.counter {
            Some(counter) => counter.total_trades,
            None => {
                SummaryCounter::from_entries(self.entries.iter().map(|s| &s.entry)).total_trades
            }
        }
    }

    /// WIN/LOSS count on a given date, served from the counter when possible.
    #[must_use]
    pub fn trades_on(&self, date: &str) -> i64 {
        match &self.counter {
            Some(counter) => counter.counts.get(date).copied().unwrap_or(0),
            None => self
                .entries
                .iter()
                .filter(|s| s.entry.date == date && s.entry.effective_type().is_trade())
                .count() as i64,
        }
    }

    /// The last counter delivered with a snapshot, if any.
    #[must_use]
    pub fn counter(&self) -> Option<&SummaryCounter> {
        self.counter.as_ref()
    }

    // ── Import / Export ─────────────────────────────────────────────

    /// Import entries from delimited text and persist them one by one.
    ///
    /// Returns the number of entries persisted. A persistence failure
    /// aborts the remaining rows, but already-written entries stay —
    /// partial import is accepted, not rolled back.
    pub async fn import_csv(&self, uid: &str, text: &str) -> Result<usize, CoreError> {
        let parsed = csv::parse_delimited(text)
            .ok_or_else(|| CoreError::Import("Input has no data rows".into()))?;

        let mut imported = 0usize;
        for entry in parsed {
            self.store.add_entry(uid, entry).await?;
            imported += 1;
        }
        Ok(imported)
    }

    /// Export the current snapshot as `Date,Asset,Type,Amount` CSV.
    #[must_use]
    pub fn export_csv(&self) -> String {
        csv::export_csv(&self.entries)
    }
}
