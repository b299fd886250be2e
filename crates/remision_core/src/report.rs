//! Sales reports over a date range.

use crate::record::Record;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How many customers and products a report ranks.
pub const TOP_N: usize = 5;

/// A customer's revenue in the period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRevenue {
    /// Customer name.
    pub name: String,
    /// Sum of document totals.
    pub revenue: f64,
}

/// A product's sold quantity in the period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductQuantity {
    /// Line item description.
    pub name: String,
    /// Sum of quantities.
    pub quantity: f64,
}

/// Aggregates of active documents dated within `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
    /// Sum of totals.
    pub total_revenue: f64,
    /// Number of documents.
    #[serde(rename = "total_notas")]
    pub record_count: usize,
    /// Revenue per document, 0 without documents.
    #[serde(rename = "avg_ticket")]
    pub average_ticket: f64,
    /// Number of line items.
    #[serde(rename = "total_items")]
    pub item_count: usize,
    /// Best customers by revenue.
    pub top_customers: Vec<CustomerRevenue>,
    /// Best products by quantity.
    pub top_products: Vec<ProductQuantity>,
}

impl Report {
    /// Builds a report over `records`. Deleted records are skipped.
    pub fn for_range(records: &[Record], start: NaiveDate, end: NaiveDate) -> Self {
        let in_range: Vec<&Record> = records
            .iter()
            .filter(|r| !r.deleted && r.date >= start && r.date <= end)
            .collect();

        let total_revenue: f64 = in_range.iter().map(|r| r.total()).sum();
        let record_count = in_range.len();
        let average_ticket = if record_count == 0 {
            0.0
        } else {
            total_revenue / record_count as f64
        };

        let mut customers: BTreeMap<&str, f64> = BTreeMap::new();
        let mut products: BTreeMap<&str, f64> = BTreeMap::new();
        let mut item_count = 0;
        for record in &in_range {
            *customers.entry(record.customer_name.as_str()).or_default() += record.total();
            for item in &record.line_items {
                item_count += 1;
                *products.entry(item.description.as_str()).or_default() += item.quantity;
            }
        }

        Self {
            start,
            end,
            total_revenue,
            record_count,
            average_ticket,
            item_count,
            top_customers: top(customers)
                .into_iter()
                .map(|(name, revenue)| CustomerRevenue { name, revenue })
                .collect(),
            top_products: top(products)
                .into_iter()
                .map(|(name, quantity)| ProductQuantity { name, quantity })
                .collect(),
        }
    }

    /// From the first of `today`'s month through `today`.
    pub fn this_month(records: &[Record], today: NaiveDate) -> Self {
        Self::for_range(records, first_of_month(today), today)
    }

    /// The whole calendar month before `today`'s.
    pub fn last_month(records: &[Record], today: NaiveDate) -> Self {
        let this_start = first_of_month(today);
        let start = this_start
            .checked_sub_months(Months::new(1))
            .unwrap_or(this_start);
        let end = this_start.pred_opt().unwrap_or(this_start);
        Self::for_range(records, start, end)
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// Highest values first, ties by name, at most [`TOP_N`].
fn top(totals: BTreeMap<&str, f64>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ranked
        .into_iter()
        .take(TOP_N)
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
