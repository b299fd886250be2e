//! Reconcile command implementation.

use super::{CommandResult, LedgerTarget};
use remision_core::{Issuer, ReconcileReport};

/// Runs the reconcile command.
pub fn run(target: &LedgerTarget) -> CommandResult {
    let report = Issuer::new(target.open()?).reconcile()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!("Counter:        {}", report.counter);
    match report.highest_record {
        Some(number) => println!("Highest record: {number}"),
        None => println!("Highest record: none"),
    }
    if let Some(number) = report.advanced_to {
        println!("Counter advanced to {number}");
    }
    if report.gap_count > 0 {
        let gaps: Vec<String> = report.gaps.iter().map(ToString::to_string).collect();
        println!("Numbers without a record ({}): {}", report.gap_count, gaps.join(", "));
        if report.gaps_truncated() {
            println!("  (first {} listed)", report.gaps.len());
        }
    }
    if report.is_clean() {
        println!("Ledger is consistent");
    }
}
