use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::entry::{EntryType, StoredEntry, SENTINEL_DATE};
use crate::models::summary::{DailyPoint, LedgerSummary};

/// Basis magnitudes at or below this are treated as "no capital" when
/// computing day and period returns.
pub(crate) const MIN_ROI_BASIS: f64 = 0.01;

/// Computes the derived statistics view from an entry snapshot.
///
/// Pure with respect to persistence: input is the live snapshot, output is
/// everything presentation needs. Malformed entries degrade locally
/// (sentinel date, zero amount, sign-inferred type) — one corrupt record
/// never aborts the computation.
pub struct AggregationService;

impl AggregationService {
    pub fn new() -> Self {
        Self
    }

    /// Derive the full statistics view from a snapshot.
    ///
    /// Single pass to partition and bucket, then one chronological walk over
    /// the date axis to produce the running-balance series.
    pub fn compute_summary(&self, entries: &[StoredEntry]) -> LedgerSummary {
        let mut net = 0.0;
        let mut deposits = 0.0;
        let mut withdrawals = 0.0;
        let mut wins = 0usize;
        let mut losses = 0usize;

        // date → trading P&L / trade count / signed transfer flow
        let mut daily_pnl: BTreeMap<String, f64> = BTreeMap::new();
        let mut daily_count: BTreeMap<String, usize> = BTreeMap::new();
        let mut daily_flow: BTreeMap<String, f64> = BTreeMap::new();

        for stored in entries {
            let entry = &stored.entry;
            let date = if entry.date.is_empty() {
                SENTINEL_DATE.to_string()
            } else {
                entry.date.clone()
            };

            match entry.effective_type() {
                EntryType::Deposit => {
                    deposits += entry.amount;
                    *daily_flow.entry(date).or_insert(0.0) += entry.amount;
                }
                EntryType::Withdraw => {
                    withdrawals += entry.amount.abs();
                    *daily_flow.entry(date).or_insert(0.0) += entry.amount;
                }
                EntryType::Win | EntryType::Loss => {
                    net += entry.amount;
                    if entry.amount > 0.0 {
                        wins += 1;
                    } else {
                        losses += 1;
                    }
                    *daily_pnl.entry(date.clone()).or_insert(0.0) += entry.amount;
                    *daily_count.entry(date).or_insert(0) += 1;
                }
            }
        }

        let funded_capital = deposits - withdrawals;
        // ROI is meaningless against non-positive funded capital.
        let roi_percent = if funded_capital > 0.0 {
            net / funded_capital * 100.0
        } else {
            0.0
        };

        let mut best_day = f64::NEG_INFINITY;
        let mut worst_day = f64::INFINITY;
        for value in daily_pnl.values() {
            if *value > best_day {
                best_day = *value;
            }
            if *value < worst_day {
                worst_day = *value;
            }
        }
        if best_day == f64::NEG_INFINITY {
            best_day = 0.0;
        }
        // A "worst" day in the green still reports 0.
        if worst_day == f64::INFINITY || worst_day > 0.0 {
            worst_day = 0.0;
        }

        let win_rate_percent = if wins + losses > 0 {
            wins as f64 / (wins + losses) as f64 * 100.0
        } else {
            0.0
        };

        LedgerSummary {
            net,
            deposits,
            withdrawals,
            funded_capital,
            balance: funded_capital + net,
            roi_percent,
            wins,
            losses,
            win_rate_percent,
            best_day,
            worst_day,
            series: build_series(&daily_pnl, &daily_count, &daily_flow),
        }
    }
}

/// Walk the chronological date axis once, maintaining the running balance.
///
/// The axis is the union of trading and transfer dates, filtered to valid
/// calendar dates. Transfer-only days move the running balance but are not
/// emitted as chart points.
fn build_series(
    daily_pnl: &BTreeMap<String, f64>,
    daily_count: &BTreeMap<String, usize>,
    daily_flow: &BTreeMap<String, f64>,
) -> Vec<DailyPoint> {
    let mut axis: Vec<&String> = daily_pnl.keys().chain(daily_flow.keys()).collect();
    axis.sort();
    axis.dedup();

    let mut series = Vec::new();
    let mut running_balance = 0.0;

    for date in axis {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            continue;
        }
        let flow = daily_flow.get(date).copied().unwrap_or(0.0);
        // Capital available to trade this day, after the day's transfers.
        let daily_basis = running_balance + flow;

        if let Some(&net_pnl) = daily_pnl.get(date) {
            let day_roi_percent = if daily_basis.abs() > MIN_ROI_BASIS {
                net_pnl / daily_basis * 100.0
            } else {
                0.0
            };
            series.push(DailyPoint {
                date: date.clone(),
                net_pnl,
                trade_count: daily_count.get(date).copied().unwrap_or(0),
                day_roi_percent,
                daily_basis,
            });
        }

        running_balance = daily_basis + daily_pnl.get(date).copied().unwrap_or(0.0);
    }

    series
}

impl Default for AggregationService {
    fn default() -> Self {
        Self::new()
    }
}
