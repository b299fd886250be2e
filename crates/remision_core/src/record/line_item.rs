//! Line items ("conceptos").

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// One row of a document.
///
/// The amount is always derived from quantity and unit price; the stored
/// `importe` is written for readers and ignored when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LineItemWire", into = "LineItemWire")]
pub struct LineItem {
    /// Units sold.
    pub quantity: f64,
    /// Free-text description.
    pub description: String,
    /// Price per unit.
    pub unit_price: f64,
}

impl LineItem {
    /// Creates a line item.
    pub fn new(quantity: f64, description: impl Into<String>, unit_price: f64) -> Self {
        Self {
            quantity,
            description: description.into(),
            unit_price,
        }
    }

    /// Returns `quantity * unit_price`.
    #[must_use]
    pub fn amount(&self) -> f64 {
        self.quantity * self.unit_price
    }

    /// Returns true if this row survives record construction.
    ///
    /// Rows without a quantity or a description are dropped.
    #[must_use]
    pub fn is_kept(&self) -> bool {
        self.quantity > 0.0 && !self.description.trim().is_empty()
    }

    /// Returns true if this row makes a draft submittable on its own.
    #[must_use]
    pub fn is_billable(&self) -> bool {
        self.is_kept() && self.unit_price > 0.0
    }

    /// Checks that quantity and unit price are finite and non-negative.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(CoreError::validation(format!(
                "quantity must be a non-negative number, got {}",
                self.quantity
            )));
        }
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(CoreError::validation(format!(
                "unit price must be a non-negative number, got {}",
                self.unit_price
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct LineItemWire {
    #[serde(default)]
    cantidad: f64,
    #[serde(default)]
    descripcion: String,
    #[serde(default)]
    pu: f64,
    #[serde(default, skip_deserializing)]
    importe: f64,
}

impl From<LineItemWire> for LineItem {
    fn from(wire: LineItemWire) -> Self {
        Self {
            quantity: wire.cantidad,
            description: wire.descripcion,
            unit_price: wire.pu,
        }
    }
}

impl From<LineItem> for LineItemWire {
    fn from(item: LineItem) -> Self {
        Self {
            importe: super::round_cents(item.amount()),
            cantidad: item.quantity,
            descripcion: item.description,
            pu: item.unit_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_derived() {
        let item = LineItem::new(3.0, "Tornillo", 2.5);
        assert!((item.amount() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn kept_and_billable() {
        assert!(LineItem::new(1.0, "x", 1.0).is_billable());
        assert!(LineItem::new(1.0, "x", 0.0).is_kept());
        assert!(!LineItem::new(1.0, "x", 0.0).is_billable());
        assert!(!LineItem::new(0.0, "x", 1.0).is_kept());
        assert!(!LineItem::new(1.0, "   ", 1.0).is_kept());
    }

    #[test]
    fn validate_rejects_negative_and_nan() {
        assert!(LineItem::new(-1.0, "x", 1.0).validate().is_err());
        assert!(LineItem::new(1.0, "x", f64::NAN).validate().is_err());
        assert!(LineItem::new(0.0, "x", 0.0).validate().is_ok());
    }

    #[test]
    fn wire_ignores_stored_amount() {
        let item: LineItem =
            serde_json::from_str(r#"{"cantidad":2,"descripcion":"Cable","pu":10,"importe":999}"#)
                .unwrap();
        assert!((item.amount() - 20.0).abs() < 1e-9);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["importe"], 20.0);
        assert_eq!(json["descripcion"], "Cable");
    }
}
