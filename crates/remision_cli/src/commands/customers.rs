//! Customers command implementation.

use super::{print_json, CommandResult, LedgerTarget, OutputFormat};
use remision_core::RecordStore;

/// Runs the customers command.
pub fn run(target: &LedgerTarget, format: OutputFormat) -> CommandResult {
    let customers = RecordStore::new(target.open()?).customers()?;
    match format {
        OutputFormat::Json => print_json(&customers)?,
        OutputFormat::Text => {
            if customers.is_empty() {
                println!("No customers");
            }
            for customer in &customers {
                if customer.city.is_empty() {
                    println!("{}", customer.name);
                } else {
                    println!("{} ({})", customer.name, customer.city);
                }
            }
        }
    }
    Ok(())
}
