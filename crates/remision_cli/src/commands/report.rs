//! Report command implementation.

use super::{print_json, CommandResult, LedgerTarget, OutputFormat};
use chrono::NaiveDate;
use clap::ValueEnum;
use remision_core::{RecordFilter, RecordStore, Report};

/// Reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Period {
    /// From the first of the current month to today.
    ThisMonth,
    /// The whole previous month.
    LastMonth,
    /// An explicit `--from`/`--to` range.
    Range,
}

/// Runs the report command.
pub fn run(
    target: &LedgerTarget,
    period: Period,
    range: Option<(NaiveDate, NaiveDate)>,
    format: OutputFormat,
) -> CommandResult {
    let records = RecordStore::new(target.open()?).list(&RecordFilter::new())?;
    let report = build(&records, period, range, chrono::Local::now().date_naive())?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

/// Computes the report for `period` as of `today`.
pub fn build(
    records: &[remision_core::Record],
    period: Period,
    range: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> CommandResult<Report> {
    Ok(match period {
        Period::ThisMonth => Report::this_month(records, today),
        Period::LastMonth => Report::last_month(records, today),
        Period::Range => {
            let (start, end) = range.ok_or("--period range needs --from and --to")?;
            if start > end {
                return Err(format!("--from {start} is after --to {end}").into());
            }
            Report::for_range(records, start, end)
        }
    })
}

fn print_text(report: &Report) {
    println!("Report {} .. {}", report.start, report.end);
    println!("  Documents:      {}", report.record_count);
    println!("  Revenue:        {:.2}", report.total_revenue);
    println!("  Average ticket: {:.2}", report.average_ticket);
    println!("  Line items:     {}", report.item_count);
    if !report.top_customers.is_empty() {
        println!();
        println!("Top customers:");
        for entry in &report.top_customers {
            println!("  {:<30} {:>12.2}", entry.name, entry.revenue);
        }
    }
    if !report.top_products.is_empty() {
        println!();
        println!("Top products:");
        for entry in &report.top_products {
            println!("  {:<30} {:>12}", entry.name, entry.quantity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_requires_bounds() {
        assert!(build(&[], Period::Range, None, day(2024, 5, 10)).is_err());
        assert!(build(
            &[],
            Period::Range,
            Some((day(2024, 5, 2), day(2024, 5, 1))),
            day(2024, 5, 10)
        )
        .is_err());
    }

    #[test]
    fn last_month_period() {
        let report = build(&[], Period::LastMonth, None, day(2024, 3, 15)).unwrap();
        assert_eq!(report.start, day(2024, 2, 1));
        assert_eq!(report.end, day(2024, 2, 29));
        assert_eq!(report.record_count, 0);
    }
}
