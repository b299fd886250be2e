//! Next command implementation.

use super::{print_json, CommandResult, LedgerTarget, OutputFormat};
use remision_core::SequenceAllocator;

/// Runs the next command.
pub fn run(target: &LedgerTarget, format: OutputFormat) -> CommandResult {
    let status = SequenceAllocator::new(target.open()?).peek()?;
    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Text => {
            println!("Last issued: {}", status.last_issued);
            println!("Next:        {}", status.next);
        }
    }
    Ok(())
}
