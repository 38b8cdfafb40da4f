use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entry::{LedgerEntry, SENTINEL_DATE};

/// Derived per-user counter stored alongside the entry log, so total-count
/// queries avoid rescanning the full history.
///
/// Best-effort: individual increments may be lost under concurrent writers.
/// The reconciliation pass on every snapshot delivery recomputes it from the
/// full entry set and overwrites any drift — the counter is never the source
/// of truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounter {
    /// Count of WIN/LOSS entries (transfers excluded)
    #[serde(default)]
    pub total_trades: i64,

    /// Date (`YYYY-MM-DD`) → count of WIN/LOSS entries on that date
    #[serde(default)]
    pub counts: BTreeMap<String, i64>,

    /// Advisory — when the counter was last rewritten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl SummaryCounter {
    /// Recompute from a full snapshot. This is the reference value the stored
    /// counter is reconciled against.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut counter = SummaryCounter::default();
        for entry in entries {
            if entry.effective_type().is_trade() {
                let date = if entry.date.is_empty() {
                    SENTINEL_DATE
                } else {
                    entry.date.as_str()
                };
                *counter.counts.entry(date.to_string()).or_insert(0) += 1;
                counter.total_trades += 1;
            }
        }
        counter
    }

    /// True when the stored counter disagrees with a fresh recomputation
    /// and must be overwritten.
    #[must_use]
    pub fn is_stale(&self, fresh: &SummaryCounter) -> bool {
        self.total_trades != fresh.total_trades || self.counts != fresh.counts
    }
}

/// Full derived statistics view over a ledger snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Net P&L over all WIN/LOSS entries
    pub net: f64,

    /// Total cash deposited
    pub deposits: f64,

    /// Total cash withdrawn (positive magnitude)
    pub withdrawals: f64,

    /// deposits − withdrawals
    pub funded_capital: f64,

    /// funded_capital + net — the current account balance
    pub balance: f64,

    /// net / funded_capital × 100; 0 whenever funded capital is not positive
    pub roi_percent: f64,

    /// Number of profitable trades
    pub wins: usize,

    /// Number of losing trades
    pub losses: usize,

    /// wins / (wins + losses) × 100; 0 when there are no trades
    pub win_rate_percent: f64,

    /// Best single-day net P&L; 0 with no trading activity
    pub best_day: f64,

    /// Worst single-day net P&L, clamped to never be positive
    pub worst_day: f64,

    /// Daily chart series, oldest first, trading days only
    pub series: Vec<DailyPoint>,
}

/// One trading day in the chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    /// Calendar date (`YYYY-MM-DD`)
    pub date: String,

    /// Net P&L of WIN/LOSS entries on this date
    pub net_pnl: f64,

    /// Number of WIN/LOSS entries on this date
    pub trade_count: usize,

    /// net_pnl / daily_basis × 100; 0 when the basis is effectively zero
    pub day_roi_percent: f64,

    /// Capital available to trade that day: the running balance after the
    /// day's transfers have been applied
    pub daily_basis: f64,
}
