//! Delete and restore command implementation.

use super::{CommandResult, LedgerTarget};
use remision_core::{Record, RecordStore, SequenceNumber};

/// Runs delete (`deleted = true`) or restore (`deleted = false`).
pub fn run(target: &LedgerTarget, number: SequenceNumber, deleted: bool) -> CommandResult {
    let record = set_deleted(target, number, deleted)?;
    let action = if deleted { "Deleted" } else { "Restored" };
    println!("{action} {} ({})", record.number, record.customer_name);
    Ok(())
}

/// Applies the flag and returns the stored record.
pub fn set_deleted(
    target: &LedgerTarget,
    number: SequenceNumber,
    deleted: bool,
) -> CommandResult<Record> {
    let store = RecordStore::new(target.open()?);
    Ok(store.set_deleted(number, deleted)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::issue::{build_draft, issue, DraftArgs};
    use crate::commands::test_support::directory_target;
    use crate::commands::Layout;
    use remision_core::{CoreError, LineItem};

    #[test]
    fn delete_restore_and_missing() {
        let (_dir, target) = directory_target(Layout::Split);
        let draft = build_draft(DraftArgs {
            customer: "Ana".into(),
            items: vec![LineItem::new(1.0, "Aceite", 90.0)],
            ..DraftArgs::default()
        });
        let record = issue(&target, &draft).unwrap();

        assert!(set_deleted(&target, record.number, true).unwrap().deleted);
        assert!(!set_deleted(&target, record.number, false).unwrap().deleted);

        let missing = SequenceNumber::new(7).unwrap();
        let err = set_deleted(&target, missing, true).unwrap_err();
        let core = err.downcast_ref::<CoreError>().unwrap();
        assert!(matches!(core, CoreError::NotFound { .. }));
    }
}
