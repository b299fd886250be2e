//! Property-based test generators using proptest.
//!
//! Provides strategies for generating drafts and records that satisfy
//! the ledger's validation rules. Money amounts are whole cents so that
//! derived totals stay exact enough to compare.

use chrono::NaiveDate;
use proptest::prelude::*;
use remision_core::{LineItem, Record, RecordDraft, SequenceNumber, SEQUENCE_MAX};

/// Strategy for valid, non-zero document numbers.
pub fn sequence_number_strategy() -> impl Strategy<Value = SequenceNumber> {
    (1..=SEQUENCE_MAX).prop_map(|n| SequenceNumber::new(n).expect("in range"))
}

/// Strategy for dates between 2020 and the end of 2027.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date");
    (0u64..2922).prop_map(move |days| base + chrono::Days::new(days))
}

/// Strategy for customer names.
pub fn customer_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-záéíóúñ]{2,12}( [A-Z][a-z]{2,12})?").expect("Invalid regex")
}

/// Strategy for city names, possibly empty.
pub fn city_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("Monterrey".to_string()),
        Just("Mérida".to_string()),
        Just("Puebla".to_string()),
    ]
}

/// Strategy for a row that survives record building and is billable.
pub fn billable_item_strategy() -> impl Strategy<Value = LineItem> {
    (
        1u32..50,
        prop::string::string_regex("[A-Za-z][a-z ]{0,20}[a-z]").expect("Invalid regex"),
        1u64..500_000,
    )
        .prop_map(|(quantity, description, cents)| {
            LineItem::new(f64::from(quantity), description, cents as f64 / 100.0)
        })
}

/// Strategy for any row a form may post, including blank rows.
pub fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    prop_oneof![
        4 => billable_item_strategy(),
        1 => Just(LineItem::new(0.0, "", 0.0)),
        1 => (1u32..10).prop_map(|q| LineItem::new(f64::from(q), "  ", 10.0)),
    ]
}

/// Strategy for tax rates seen in practice.
pub fn tax_rate_strategy() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), Just(Some(0.0)), Just(Some(0.08)), Just(Some(0.16))]
}

/// Strategy for drafts that pass validation.
pub fn draft_strategy() -> impl Strategy<Value = RecordDraft> {
    (
        date_strategy(),
        customer_strategy(),
        city_strategy(),
        billable_item_strategy(),
        prop::collection::vec(line_item_strategy(), 0..5),
        tax_rate_strategy(),
    )
        .prop_map(|(date, customer, city, first, rest, tax_rate)| {
            let mut draft = RecordDraft::new(date, customer).with_city(city);
            draft.line_items.push(first);
            draft.line_items.extend(rest);
            draft.tax_rate = tax_rate;
            draft
        })
}

/// Strategy for a history of up to `max` records numbered `1..=n`.
pub fn history_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec((draft_strategy(), any::<bool>()), 0..=max).prop_map(|drafts| {
        drafts
            .into_iter()
            .enumerate()
            .map(|(i, (draft, deleted))| {
                let number = SequenceNumber::new(i as u64 + 1).expect("in range");
                let mut record = draft.to_record(number, remision_core::DEFAULT_TAX_RATE);
                record.deleted = deleted;
                record
            })
            .collect()
    })
}

/// A ledger operation for model-based tests.
#[derive(Debug, Clone)]
pub enum LedgerOperation {
    /// Issue a draft.
    Issue {
        /// The draft to issue.
        draft: RecordDraft,
    },
    /// Delete the record at this position among issued ones (modulo count).
    Delete {
        /// Position selector.
        index: usize,
    },
    /// Restore the record at this position among issued ones (modulo count).
    Restore {
        /// Position selector.
        index: usize,
    },
}

/// Strategy for a single ledger operation.
pub fn operation_strategy() -> impl Strategy<Value = LedgerOperation> {
    prop_oneof![
        3 => draft_strategy().prop_map(|draft| LedgerOperation::Issue { draft }),
        1 => any::<usize>().prop_map(|index| LedgerOperation::Delete { index }),
        1 => any::<usize>().prop_map(|index| LedgerOperation::Restore { index }),
    ]
}

/// Strategy for a sequence of ledger operations.
pub fn operations_strategy(max_ops: usize) -> impl Strategy<Value = Vec<LedgerOperation>> {
    prop::collection::vec(operation_strategy(), 1..=max_ops)
}
