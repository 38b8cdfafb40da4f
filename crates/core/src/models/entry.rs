use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Fallback date for records whose date cannot be recovered.
pub const SENTINEL_DATE: &str = "1970-01-01";

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    /// Trade closed with a profit
    Win,
    /// Trade closed with a loss
    Loss,
    /// Cash moved into the account
    Deposit,
    /// Cash taken out of the account
    Withdraw,
}

impl EntryType {
    /// Historical records carry no `type` field; their kind is derived
    /// from the sign of the amount.
    pub fn infer(amount: f64) -> Self {
        if amount >= 0.0 {
            EntryType::Win
        } else {
            EntryType::Loss
        }
    }

    /// WIN/LOSS close a trade; DEPOSIT/WITHDRAW only move cash.
    #[must_use]
    pub fn is_trade(self) -> bool {
        matches!(self, EntryType::Win | EntryType::Loss)
    }

    #[must_use]
    pub fn is_transfer(self) -> bool {
        !self.is_trade()
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Win => write!(f, "WIN"),
            EntryType::Loss => write!(f, "LOSS"),
            EntryType::Deposit => write!(f, "DEPOSIT"),
            EntryType::Withdraw => write!(f, "WITHDRAW"),
        }
    }
}

/// A single cash event in the ledger: a trade result or an account transfer.
///
/// Entries are immutable once persisted — corrections are delete + re-add.
/// Sign convention: WIN/DEPOSIT amounts are stored non-negative,
/// LOSS/WITHDRAW amounts negative (callers negate before persisting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Creation stamp in milliseconds; tie-break sort key for same-day entries
    pub id: i64,

    /// Calendar date (`YYYY-MM-DD`), authoritative for daily bucketing
    pub date: String,

    /// Instrument symbol; `"CASH"` for transfer entries
    pub asset: String,

    /// Absent on historical records — see [`EntryType::infer`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,

    /// Signed amount in account currency
    #[serde(default)]
    pub amount: f64,

    /// Creation instant (RFC 3339), audit only — never used for ordering
    #[serde(default)]
    pub timestamp: String,
}

impl LedgerEntry {
    pub fn new(
        date: impl Into<String>,
        asset: impl Into<String>,
        entry_type: Option<EntryType>,
        amount: f64,
    ) -> Self {
        Self {
            id: next_entry_id(),
            date: date.into(),
            asset: asset.into(),
            entry_type,
            amount,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// The stored type when present, sign-derived otherwise.
    /// Must never fail, even when the stored type disagrees with the sign.
    #[must_use]
    pub fn effective_type(&self) -> EntryType {
        self.entry_type
            .unwrap_or_else(|| EntryType::infer(self.amount))
    }
}

/// A persisted entry together with the id the document store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// Store-assigned document id — the handle used for deletes
    pub doc_id: String,
    pub entry: LedgerEntry,
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Entry ids are wall-clock milliseconds, bumped to stay strictly increasing
/// when several entries are created within the same millisecond.
pub(crate) fn next_entry_id() -> i64 {
    let now = Utc::now().timestamp_millis();
    loop {
        let last = LAST_ID.load(Ordering::Relaxed);
        let candidate = now.max(last + 1);
        if LAST_ID
            .compare_exchange(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return candidate;
        }
    }
}
