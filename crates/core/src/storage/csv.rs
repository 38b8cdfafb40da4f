//! Delimited-text import/export for ledger entries.
//!
//! Two dialects are accepted: the journal's own `date,asset,type,amount`
//! format and the broker account-history export, detected by a header
//! marker. Both funnel through one normalized row shape before an entry is
//! built, so the dialects cannot drift apart.

use log::debug;

use crate::models::entry::{EntryType, LedgerEntry, StoredEntry};

/// Header marker distinguishing the broker export from the standard format.
const BROKER_HEADER_MARKER: &str = "closing_time_utc";

/// Broker export column layout.
const BROKER_COL_CLOSE_TIME: usize = 2;
const BROKER_COL_KIND: usize = 3;
const BROKER_COL_SYMBOL: usize = 6;
const BROKER_COL_PROFIT: usize = 13;

/// Both dialects normalize to this shape before validation.
struct ImportRow {
    date: String,
    asset: String,
    entry_type: EntryType,
    amount: f64,
}

/// Parse a delimited text blob into ledger entries.
///
/// Returns `None` when the input is too short to contain a header plus at
/// least one row. Rows missing required fields or whose amount fails to
/// parse are skipped, never fatal.
pub fn parse_delimited(text: &str) -> Option<Vec<LedgerEntry>> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 2 {
        return None;
    }

    let is_broker = lines[0].contains(BROKER_HEADER_MARKER);
    let mut entries = Vec::new();

    for line in &lines[1..] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split(',').collect();
        let row = if is_broker {
            broker_row(&cols)
        } else {
            standard_row(&cols)
        };
        match row {
            Some(row) => entries.push(LedgerEntry::new(
                row.date,
                row.asset,
                Some(row.entry_type),
                row.amount,
            )),
            None => debug!("skipping malformed import row: {line}"),
        }
    }

    Some(entries)
}

/// Standard format: `date,asset,type,amount` — type optional.
fn standard_row(cols: &[&str]) -> Option<ImportRow> {
    let date = cols.first().copied().filter(|d| !d.is_empty())?.to_string();
    let asset = cols.get(1).copied().unwrap_or("").to_string();
    let amount: f64 = cols.get(3)?.trim().parse().ok()?;
    let entry_type = cols
        .get(2)
        .copied()
        .filter(|t| !t.is_empty())
        .and_then(parse_type)
        .unwrap_or_else(|| EntryType::infer(amount));

    Some(ImportRow {
        date,
        asset,
        entry_type,
        amount,
    })
}

/// Broker export: rows are either balance transfers or trade closures.
fn broker_row(cols: &[&str]) -> Option<ImportRow> {
    let close_time = cols
        .get(BROKER_COL_CLOSE_TIME)
        .copied()
        .filter(|c| !c.is_empty())?;
    let amount: f64 = cols.get(BROKER_COL_PROFIT)?.trim().parse().ok()?;
    let date = close_time
        .split('T')
        .next()
        .unwrap_or(close_time)
        .to_string();

    if cols.get(BROKER_COL_KIND).copied() == Some("balance") {
        // Balance rows are account transfers, not trades.
        let entry_type = if amount >= 0.0 {
            EntryType::Deposit
        } else {
            EntryType::Withdraw
        };
        Some(ImportRow {
            date,
            asset: "CASH".to_string(),
            entry_type,
            amount,
        })
    } else {
        Some(ImportRow {
            date,
            asset: clean_broker_symbol(cols.get(BROKER_COL_SYMBOL).copied().unwrap_or("")),
            entry_type: EntryType::infer(amount),
            amount,
        })
    }
}

fn parse_type(raw: &str) -> Option<EntryType> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "WIN" => Some(EntryType::Win),
        "LOSS" => Some(EntryType::Loss),
        "DEPOSIT" => Some(EntryType::Deposit),
        "WITHDRAW" => Some(EntryType::Withdraw),
        _ => None,
    }
}

/// Broker symbols carry an account-type suffix (`EURUSDm`) and run currency
/// pairs together; strip the suffix and re-delimit dollar pairs.
fn clean_broker_symbol(raw: &str) -> String {
    if raw.is_empty() {
        return "Unknown".to_string();
    }
    let stripped = raw.replacen('m', "", 1);
    if stripped.contains("USD") {
        stripped.replacen("USD", "/USD", 1)
    } else {
        stripped
    }
}

/// Export entries as `Date,Asset,Type,Amount` CSV, one row per entry.
///
/// Fields never contain commas in practice, so no escaping is applied.
pub fn export_csv(entries: &[StoredEntry]) -> String {
    let mut csv = String::from("Date,Asset,Type,Amount\n");
    for stored in entries {
        let entry = &stored.entry;
        csv.push_str(&format!(
            "{},{},{},{}\n",
            entry.date,
            entry.asset,
            entry.effective_type(),
            entry.amount,
        ));
    }
    csv
}
