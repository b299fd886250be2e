//! Unsubmitted documents.

use super::{infer_tax_rate, LineItem, Record};
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A document as filled in by the user, before it has a number.
///
/// Drafts are validated before any ledger access. When a draft becomes a
/// [`Record`], rows without quantity or description are dropped and a
/// missing tax rate falls back to the ledger default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DraftWire")]
pub struct RecordDraft {
    /// Issue date.
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    /// Customer name. Required.
    #[serde(rename = "cliente")]
    pub customer_name: String,
    /// Customer city.
    #[serde(rename = "ciudad")]
    pub city: String,
    /// Rows in entry order.
    #[serde(rename = "conceptos")]
    pub line_items: Vec<LineItem>,
    /// Tax rate; `None` uses the ledger default.
    #[serde(rename = "tasa_iva", skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    /// Absolute discount.
    #[serde(rename = "descuento")]
    pub discount: f64,
    /// Delivery address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Caller-chosen key copied onto the record, used to find it again.
    #[serde(rename = "solicitud", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RecordDraft {
    /// Creates an empty draft for a customer.
    pub fn new(date: NaiveDate, customer_name: impl Into<String>) -> Self {
        Self {
            date,
            customer_name: customer_name.into(),
            city: String::new(),
            line_items: Vec::new(),
            tax_rate: None,
            discount: 0.0,
            email: None,
            request_id: None,
        }
    }

    /// Sets the city.
    #[must_use]
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    /// Appends a row.
    #[must_use]
    pub fn with_item(mut self, quantity: f64, description: impl Into<String>, unit_price: f64) -> Self {
        self.line_items
            .push(LineItem::new(quantity, description, unit_price));
        self
    }

    /// Sets an explicit tax rate.
    #[must_use]
    pub fn with_tax_rate(mut self, rate: f64) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    /// Sets the discount.
    #[must_use]
    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    /// Sets the delivery address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the request id carried onto the record.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Checks the draft is submittable.
    ///
    /// A draft needs a non-empty customer name and at least one row with
    /// quantity, price and description. Every row must have finite,
    /// non-negative numbers.
    pub fn validate(&self) -> CoreResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(CoreError::validation("customer name is required"));
        }
        for item in &self.line_items {
            item.validate()?;
        }
        if !self.line_items.iter().any(LineItem::is_billable) {
            return Err(CoreError::validation(
                "at least one line item with quantity, price and description is required",
            ));
        }
        if let Some(rate) = self.tax_rate {
            super::validate_tax_rate(rate)?;
        }
        if let Some(email) = &self.email {
            super::validate_email(email)?;
        }
        if let Some(request_id) = &self.request_id {
            super::validate_request_id(request_id)?;
        }
        // Total is checked on the built record, where the rate is resolved.
        if !self.discount.is_finite() || self.discount < 0.0 {
            return Err(CoreError::validation(format!(
                "discount must be a non-negative number, got {}",
                self.discount
            )));
        }
        Ok(())
    }

    /// Builds the record this draft becomes under `number`.
    ///
    /// Does not validate; call [`validate`](Self::validate) first.
    #[must_use]
    pub fn to_record(&self, number: SequenceNumber, default_tax_rate: f64) -> Record {
        Record {
            number,
            date: self.date,
            customer_name: self.customer_name.trim().to_string(),
            city: self.city.trim().to_string(),
            line_items: self
                .line_items
                .iter()
                .filter(|item| item.is_kept())
                .cloned()
                .map(|mut item| {
                    item.description = item.description.trim().to_string();
                    item
                })
                .collect(),
            tax_rate: self.tax_rate.unwrap_or(default_tax_rate),
            discount: self.discount,
            email: self
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            request_id: self.request_id.clone(),
            deleted: false,
        }
    }
}

#[derive(Deserialize)]
struct DraftWire {
    fecha: NaiveDate,
    #[serde(default)]
    cliente: String,
    #[serde(default)]
    ciudad: String,
    #[serde(default)]
    conceptos: Vec<LineItem>,
    #[serde(default)]
    tasa_iva: Option<f64>,
    #[serde(default)]
    subtotal: Option<f64>,
    #[serde(default)]
    iva: Option<f64>,
    #[serde(default)]
    descuento: f64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    solicitud: Option<String>,
}

impl From<DraftWire> for RecordDraft {
    fn from(wire: DraftWire) -> Self {
        // Older forms post the computed tax amount instead of the rate.
        let tax_rate = wire
            .tasa_iva
            .or_else(|| wire.iva.zip(wire.subtotal).and_then(|(iva, sub)| infer_tax_rate(iva, sub)));
        Self {
            date: wire.fecha,
            customer_name: wire.cliente,
            city: wire.ciudad,
            line_items: wire.conceptos,
            tax_rate,
            discount: wire.descuento,
            email: wire.email,
            request_id: wire.solicitud,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn valid_draft() {
        let draft = RecordDraft::new(date(), "Ferretería López").with_item(2.0, "Martillo", 150.0);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn customer_is_required() {
        let draft = RecordDraft::new(date(), "   ").with_item(1.0, "x", 1.0);
        let err = draft.validate().unwrap_err();
        assert!(err.to_string().contains("customer"));
    }

    #[test]
    fn needs_a_billable_row() {
        let draft = RecordDraft::new(date(), "A")
            .with_item(0.0, "sin cantidad", 10.0)
            .with_item(1.0, "", 10.0)
            .with_item(1.0, "sin precio", 0.0);
        assert!(matches!(draft.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn negative_numbers_rejected() {
        let draft = RecordDraft::new(date(), "A")
            .with_item(1.0, "ok", 1.0)
            .with_item(-1.0, "bad", 1.0);
        assert!(draft.validate().is_err());

        let draft = RecordDraft::new(date(), "A")
            .with_item(1.0, "ok", 1.0)
            .with_discount(-5.0);
        assert!(draft.validate().is_err());

        let draft = RecordDraft::new(date(), "A")
            .with_item(1.0, "ok", 1.0)
            .with_tax_rate(1.5);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn to_record_drops_empty_rows() {
        let draft = RecordDraft::new(date(), "  Cliente  ")
            .with_city("Monterrey")
            .with_item(1.0, "Uno", 10.0)
            .with_item(0.0, "Cero", 10.0)
            .with_item(2.0, "  ", 10.0)
            .with_item(3.0, "Regalo", 0.0);
        let record = draft.to_record(SequenceNumber::new(7).unwrap(), 0.16);

        assert_eq!(record.customer_name, "Cliente");
        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.line_items[1].description, "Regalo");
        assert!((record.tax_rate - 0.16).abs() < f64::EPSILON);
        assert!(!record.deleted);
    }

    #[test]
    fn decodes_form_payload() {
        let draft: RecordDraft = serde_json::from_str(
            r#"{
                "fecha": "2024-03-15",
                "remision": "00000003",
                "cliente": "Taller Ruiz",
                "ciudad": "Saltillo",
                "conceptos": [{"cantidad": 2, "descripcion": "Balata", "pu": 100, "importe": 200}],
                "subtotal": 200,
                "iva": 16,
                "total": 216
            }"#,
        )
        .unwrap();

        assert_eq!(draft.customer_name, "Taller Ruiz");
        assert_eq!(draft.line_items.len(), 1);
        assert!((draft.tax_rate.unwrap() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn explicit_rate_wins() {
        let draft: RecordDraft = serde_json::from_str(
            r#"{"fecha":"2024-03-15","cliente":"A","tasa_iva":0,"subtotal":100,"iva":16}"#,
        )
        .unwrap();
        assert_eq!(draft.tax_rate, Some(0.0));
    }
}
