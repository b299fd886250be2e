//! Init command implementation.

use super::{CommandResult, LedgerTarget};
use remision_core::{LedgerAdapter, SequenceNumber};

/// What `init` created.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InitResult {
    /// The counter was written.
    pub created_counter: bool,
    /// The history was written.
    pub created_history: bool,
}

/// Runs the init command.
pub fn run(target: &LedgerTarget) -> CommandResult {
    let ledger = target.open()?;
    let result = initialize(ledger.as_ref())?;
    if result == InitResult::default() {
        println!("Ledger already initialized");
    } else {
        println!("Initialized empty ledger");
    }
    Ok(())
}

/// Writes an empty counter and history where none exist.
pub fn initialize(ledger: &dyn LedgerAdapter) -> CommandResult<InitResult> {
    let mut result = InitResult::default();

    let counter = ledger.read_counter()?;
    if counter.token.is_absent() {
        ledger.write_counter(SequenceNumber::ZERO, &counter.token)?;
        result.created_counter = true;
    }

    let records = ledger.read_records()?;
    if records.token.is_absent() {
        ledger.write_records(&[], &records.token)?;
        result.created_history = true;
    }

    Ok(result)
}
