//! Documents and their JSON representation.
//!
//! Records serialize to the shape of the history file:
//!
//! ```json
//! {
//!   "remision": "00000042",
//!   "fecha": "2024-03-15",
//!   "cliente": "Taller Ruiz",
//!   "ciudad": "Saltillo",
//!   "conceptos": [{"cantidad": 2, "descripcion": "Balata", "pu": 100, "importe": 200}],
//!   "subtotal": 200, "tasa_iva": 0.16, "iva": 32, "descuento": 0, "total": 232,
//!   "deleted": false
//! }
//! ```
//!
//! `importe`, `subtotal`, `iva` and `total` are written for readers and
//! recomputed on decode. Documents written before `tasa_iva` existed get
//! their rate back from `iva / subtotal`.

mod draft;
mod line_item;

pub use draft::RecordDraft;
pub use line_item::LineItem;

use crate::config::DEFAULT_TAX_RATE;
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An issued document ("remisión").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordWire", into = "RecordWire")]
pub struct Record {
    /// Allocated number. Immutable once assigned.
    pub number: SequenceNumber,
    /// Issue date.
    pub date: NaiveDate,
    /// Customer name.
    pub customer_name: String,
    /// Customer city.
    pub city: String,
    /// Rows in entry order.
    pub line_items: Vec<LineItem>,
    /// Tax rate applied to the subtotal.
    pub tax_rate: f64,
    /// Absolute discount subtracted from the total.
    pub discount: f64,
    /// Delivery address, if any.
    pub email: Option<String>,
    /// Request id of the draft this record was issued from, if any.
    pub request_id: Option<String>,
    /// Soft-delete flag.
    pub deleted: bool,
}

impl Record {
    /// Sum of line amounts.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.line_items.iter().map(LineItem::amount).sum()
    }

    /// `subtotal * tax_rate`.
    #[must_use]
    pub fn tax_amount(&self) -> f64 {
        self.subtotal() * self.tax_rate
    }

    /// `subtotal + tax_amount - discount`.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.subtotal() + self.tax_amount() - self.discount
    }

    /// Checks the fields required to store the record.
    pub fn validate(&self) -> CoreResult<()> {
        if self.number == SequenceNumber::ZERO {
            return Err(CoreError::validation("document number 00000000 is reserved"));
        }
        if self.customer_name.trim().is_empty() {
            return Err(CoreError::validation("customer name is required"));
        }
        if self.line_items.is_empty() {
            return Err(CoreError::validation("at least one line item is required"));
        }
        for item in &self.line_items {
            item.validate()?;
        }
        validate_tax_rate(self.tax_rate)?;
        if !self.discount.is_finite() || self.discount < 0.0 {
            return Err(CoreError::validation(format!(
                "discount must be a non-negative number, got {}",
                self.discount
            )));
        }
        if self.total() < 0.0 {
            return Err(CoreError::validation(format!(
                "discount {} exceeds the taxed subtotal",
                self.discount
            )));
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(request_id) = &self.request_id {
            validate_request_id(request_id)?;
        }
        Ok(())
    }

    /// Returns true if `other` carries the same customer, date and rows,
    /// ignoring number and deletion state.
    #[must_use]
    pub fn same_content(&self, other: &Record) -> bool {
        self.date == other.date
            && self.customer_name == other.customer_name
            && self.city == other.city
            && self.line_items == other.line_items
    }
}

/// Rounds a money amount to cents.
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Recovers a tax rate from a stored tax amount, to four decimals.
pub(crate) fn infer_tax_rate(tax_amount: f64, subtotal: f64) -> Option<f64> {
    if subtotal.is_finite() && subtotal > 0.0 && tax_amount.is_finite() {
        Some((tax_amount / subtotal * 10_000.0).round() / 10_000.0)
    } else {
        None
    }
}

pub(crate) fn validate_tax_rate(rate: f64) -> CoreResult<()> {
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "tax rate must be between 0 and 1, got {rate}"
        )))
    }
}

pub(crate) fn validate_request_id(request_id: &str) -> CoreResult<()> {
    if request_id.trim().is_empty() || request_id.len() > 128 {
        Err(CoreError::validation(
            "request id must be between 1 and 128 characters",
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_email(email: &str) -> CoreResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(CoreError::validation(format!("invalid email address {email:?}"))),
    }
}

#[derive(Serialize, Deserialize)]
struct RecordWire {
    remision: SequenceNumber,
    fecha: NaiveDate,
    #[serde(default)]
    cliente: String,
    #[serde(default)]
    ciudad: String,
    #[serde(default)]
    conceptos: Vec<LineItem>,
    #[serde(default)]
    subtotal: Option<f64>,
    #[serde(default)]
    tasa_iva: Option<f64>,
    #[serde(default)]
    iva: Option<f64>,
    #[serde(default)]
    descuento: f64,
    #[serde(default)]
    total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    solicitud: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl From<RecordWire> for Record {
    fn from(wire: RecordWire) -> Self {
        let tax_rate = wire
            .tasa_iva
            .or_else(|| wire.iva.zip(wire.subtotal).and_then(|(iva, sub)| infer_tax_rate(iva, sub)))
            .unwrap_or(DEFAULT_TAX_RATE);
        Self {
            number: wire.remision,
            date: wire.fecha,
            customer_name: wire.cliente,
            city: wire.ciudad,
            line_items: wire.conceptos,
            tax_rate,
            discount: wire.descuento,
            email: wire.email,
            request_id: wire.solicitud,
            deleted: wire.deleted,
        }
    }
}

impl From<Record> for RecordWire {
    fn from(record: Record) -> Self {
        let subtotal = record.subtotal();
        let iva = record.tax_amount();
        let total = record.total();
        Self {
            remision: record.number,
            fecha: record.date,
            cliente: record.customer_name,
            ciudad: record.city,
            conceptos: record.line_items,
            subtotal: Some(round_cents(subtotal)),
            tasa_iva: Some(record.tax_rate),
            iva: Some(round_cents(iva)),
            descuento: record.discount,
            total: Some(round_cents(total)),
            email: record.email,
            solicitud: record.request_id,
            deleted: record.deleted,
        }
    }
}
