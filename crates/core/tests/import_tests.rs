// ═══════════════════════════════════════════════════════════════════
// Import/Export Tests — delimited-text parsing (standard and broker
// dialects) and CSV export
// ═══════════════════════════════════════════════════════════════════

use trade_journal_core::models::entry::{EntryType, LedgerEntry, StoredEntry};
use trade_journal_core::storage::csv::{export_csv, parse_delimited};

/// A broker-export row: fills the 14 columns the parser cares about.
fn broker_row(close_time: &str, kind: &str, symbol: &str, profit: &str) -> String {
    let mut cols = vec![""; 14];
    cols[2] = close_time;
    cols[3] = kind;
    cols[6] = symbol;
    cols[13] = profit;
    cols.join(",")
}

// ═══════════════════════════════════════════════════════════════════
// Standard dialect
// ═══════════════════════════════════════════════════════════════════

#[test]
fn input_shorter_than_header_plus_one_row_is_rejected() {
    assert!(parse_delimited("").is_none());
    assert!(parse_delimited("Date,Asset,Type,Amount").is_none());
}

#[test]
fn standard_rows_are_parsed() {
    let text = "Date,Asset,Type,Amount\n\
                2024-01-02,BTC/USD,WIN,150.5\n\
                2024-01-03,EUR/USD,LOSS,-40\n\
                2024-01-04,CASH,DEPOSIT,1000\n\
                2024-01-05,CASH,WITHDRAW,-250\n";
    let entries = parse_delimited(text).unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].date, "2024-01-02");
    assert_eq!(entries[0].asset, "BTC/USD");
    assert_eq!(entries[0].entry_type, Some(EntryType::Win));
    assert_eq!(entries[0].amount, 150.5);

    assert_eq!(entries[1].entry_type, Some(EntryType::Loss));
    assert_eq!(entries[2].entry_type, Some(EntryType::Deposit));
    assert_eq!(entries[3].entry_type, Some(EntryType::Withdraw));
    assert_eq!(entries[3].amount, -250.0);
}

#[test]
fn omitted_type_is_inferred_from_the_amount_sign() {
    let text = "Date,Asset,Type,Amount\n\
                2024-01-02,BTC/USD,,100\n\
                2024-01-03,BTC/USD,,-5\n";
    let entries = parse_delimited(text).unwrap();

    assert_eq!(entries[0].entry_type, Some(EntryType::Win));
    assert_eq!(entries[1].entry_type, Some(EntryType::Loss));
}

#[test]
fn unknown_type_labels_fall_back_to_sign_inference() {
    let text = "Date,Asset,Type,Amount\n2024-01-02,BTC/USD,BONUS,-7\n";
    let entries = parse_delimited(text).unwrap();
    assert_eq!(entries[0].entry_type, Some(EntryType::Loss));
}

#[test]
fn malformed_rows_are_skipped_not_fatal() {
    let text = "Date,Asset,Type,Amount\n\
                2024-01-02,BTC/USD,WIN,not-a-number\n\
                ,BTC/USD,WIN,10\n\
                2024-01-02,BTC/USD,WIN\n\
                \n\
                2024-01-03,EUR/USD,WIN,25\n";
    let entries = parse_delimited(text).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, "2024-01-03");
}

#[test]
fn parsed_entries_receive_fresh_ids_and_timestamps() {
    let text = "Date,Asset,Type,Amount\n\
                2024-01-02,BTC/USD,WIN,10\n\
                2024-01-02,BTC/USD,LOSS,-5\n";
    let entries = parse_delimited(text).unwrap();

    assert!(entries[0].id < entries[1].id);
    assert!(!entries[0].timestamp.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Broker dialect
// ═══════════════════════════════════════════════════════════════════

fn broker_text(rows: &[String]) -> String {
    format!("ticket,opening_time_utc,closing_time_utc,kind\n{}\n", rows.join("\n"))
}

#[test]
fn broker_header_marker_selects_the_broker_branch() {
    let text = broker_text(&[broker_row("2024-03-05T12:30:00", "trade", "EURUSDm", "25.40")]);
    let entries = parse_delimited(&text).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, "2024-03-05");
    assert_eq!(entries[0].asset, "EUR/USD");
    assert_eq!(entries[0].entry_type, Some(EntryType::Win));
    assert_eq!(entries[0].amount, 25.4);
}

#[test]
fn negative_balance_rows_become_withdrawals() {
    let text = broker_text(&[broker_row("2024-03-05T09:00:00", "balance", "", "-500")]);
    let entries = parse_delimited(&text).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, Some(EntryType::Withdraw));
    assert_eq!(entries[0].asset, "CASH");
    assert_eq!(entries[0].amount, -500.0);
}

#[test]
fn non_negative_balance_rows_become_deposits() {
    let text = broker_text(&[broker_row("2024-03-05T09:00:00", "balance", "", "1000")]);
    let entries = parse_delimited(&text).unwrap();

    assert_eq!(entries[0].entry_type, Some(EntryType::Deposit));
    assert_eq!(entries[0].asset, "CASH");
}

#[test]
fn losing_trades_map_to_loss_by_profit_sign() {
    let text = broker_text(&[broker_row("2024-03-06T15:45:10", "trade", "XAUUSDm", "-12.8")]);
    let entries = parse_delimited(&text).unwrap();

    assert_eq!(entries[0].entry_type, Some(EntryType::Loss));
    assert_eq!(entries[0].asset, "XAU/USD");
}

#[test]
fn broker_symbols_are_cleaned_up() {
    let rows = [
        ("EURUSDm", "EUR/USD"),
        ("XAUUSDm", "XAU/USD"),
        // No dollar leg: only the account-type suffix is stripped.
        ("GBPJPYm", "GBPJPY"),
    ];
    for (raw, expected) in rows {
        let text = broker_text(&[broker_row("2024-03-05T12:00:00", "trade", raw, "1.0")]);
        let entries = parse_delimited(&text).unwrap();
        assert_eq!(entries[0].asset, expected, "symbol {raw}");
    }

    // A row with no symbol at all still imports, under a placeholder.
    let text = broker_text(&[broker_row("2024-03-05T12:00:00", "trade", "", "1.0")]);
    let entries = parse_delimited(&text).unwrap();
    assert_eq!(entries[0].asset, "Unknown");
}

#[test]
fn broker_rows_missing_required_columns_are_skipped() {
    let missing_time = broker_row("", "trade", "EURUSDm", "10");
    let missing_profit = broker_row("2024-03-05T12:00:00", "trade", "EURUSDm", "");
    let short_row = "1,2,2024-03-05T12:00:00,trade".to_string();
    let good = broker_row("2024-03-05T12:00:00", "trade", "EURUSDm", "10");

    let text = broker_text(&[missing_time, missing_profit, short_row, good]);
    let entries = parse_delimited(&text).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 10.0);
}

#[test]
fn date_is_the_substring_before_the_time_marker() {
    let text = broker_text(&[broker_row("2024-03-05", "trade", "EURUSDm", "1")]);
    let entries = parse_delimited(&text).unwrap();
    assert_eq!(entries[0].date, "2024-03-05");
}

// ═══════════════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════════════

fn stored(date: &str, asset: &str, entry_type: Option<EntryType>, amount: f64) -> StoredEntry {
    StoredEntry {
        doc_id: "doc".into(),
        entry: LedgerEntry::new(date, asset, entry_type, amount),
    }
}

#[test]
fn export_writes_one_row_per_entry() {
    let entries = vec![
        stored("2024-01-02", "BTC/USD", Some(EntryType::Win), 150.5),
        stored("2024-01-03", "CASH", Some(EntryType::Withdraw), -250.0),
    ];
    let csv = export_csv(&entries);

    assert_eq!(
        csv,
        "Date,Asset,Type,Amount\n\
         2024-01-02,BTC/USD,WIN,150.5\n\
         2024-01-03,CASH,WITHDRAW,-250\n"
    );
}

#[test]
fn export_prints_the_inferred_type_for_untyped_records() {
    let entries = vec![stored("2024-01-02", "EUR/USD", None, -40.0)];
    let csv = export_csv(&entries);
    assert!(csv.contains("2024-01-02,EUR/USD,LOSS,-40\n"));
}

#[test]
fn export_of_an_empty_ledger_is_just_the_header() {
    assert_eq!(export_csv(&[]), "Date,Asset,Type,Amount\n");
}
