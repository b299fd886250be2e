//! List command implementation.

use super::{print_json, CommandResult, LedgerTarget, OutputFormat};
use chrono::NaiveDate;
use remision_core::{Record, RecordFilter, RecordStore, SortOrder};

/// Builds the filter for the list flags.
pub fn filter(
    all: bool,
    ascending: bool,
    customer: Option<String>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> RecordFilter {
    let order = if ascending {
        SortOrder::Ascending
    } else {
        SortOrder::Descending
    };
    let mut filter = RecordFilter::new().include_deleted(all).order(order);
    if let Some(needle) = customer {
        filter = filter.customer(needle);
    }
    if let Some((from, to)) = range {
        filter = filter.between(from, to);
    }
    filter
}

/// Runs the list command.
pub fn run(target: &LedgerTarget, filter: &RecordFilter, format: OutputFormat) -> CommandResult {
    let records = RecordStore::new(target.open()?).list(filter)?;
    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Text => print_table(&records),
    }
    Ok(())
}

fn print_table(records: &[Record]) {
    if records.is_empty() {
        println!("No documents");
        return;
    }
    println!(
        "{:<8}  {:<10}  {:<30}  {:>12}",
        "Number", "Date", "Customer", "Total"
    );
    for record in records {
        let mark = if record.deleted { "  (deleted)" } else { "" };
        println!(
            "{:<8}  {:<10}  {:<30}  {:>12.2}{mark}",
            record.number,
            record.date,
            truncate(&record.customer_name, 30),
            record.total()
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    }
}
