//! Issue command implementation.

use super::{print_json, CommandResult, LedgerTarget, OutputFormat};
use chrono::NaiveDate;
use remision_core::{Issuer, LineItem, Record, RecordDraft};
use std::io::Read;
use std::path::Path;

/// Draft fields given on the command line.
#[derive(Debug, Default)]
pub struct DraftArgs {
    /// Customer name.
    pub customer: String,
    /// Customer city.
    pub city: String,
    /// Issue date; today when absent.
    pub date: Option<NaiveDate>,
    /// Rows.
    pub items: Vec<LineItem>,
    /// Tax rate; the ledger default when absent.
    pub tax_rate: Option<f64>,
    /// Absolute discount.
    pub discount: f64,
    /// Delivery e-mail.
    pub email: Option<String>,
}

/// Parses `QTY:DESCRIPTION:UNIT_PRICE`. The description may contain colons.
pub fn parse_item(raw: &str) -> Result<LineItem, String> {
    let (quantity, rest) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected QTY:DESCRIPTION:UNIT_PRICE, got {raw:?}"))?;
    let (description, price) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("expected QTY:DESCRIPTION:UNIT_PRICE, got {raw:?}"))?;
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity {quantity:?}"))?;
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid unit price {price:?}"))?;
    Ok(LineItem::new(quantity, description.trim(), price))
}

/// Builds a draft from command-line fields.
pub fn build_draft(args: DraftArgs) -> RecordDraft {
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut draft = RecordDraft::new(date, args.customer)
        .with_city(args.city)
        .with_discount(args.discount);
    draft.line_items = args.items;
    if let Some(rate) = args.tax_rate {
        draft = draft.with_tax_rate(rate);
    }
    if let Some(email) = args.email {
        draft = draft.with_email(email);
    }
    draft
}

/// Reads a JSON draft from a file, or from stdin for `-`.
pub fn read_draft(path: &Path) -> CommandResult<RecordDraft> {
    let content = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(path)?
    };
    Ok(serde_json::from_slice(&content)?)
}

/// Issues `draft` and returns the stored record.
pub fn issue(target: &LedgerTarget, draft: &RecordDraft) -> CommandResult<Record> {
    let issuer = Issuer::new(target.open()?);
    Ok(issuer.issue(draft)?)
}

/// Runs the issue command.
pub fn run(target: &LedgerTarget, draft: &RecordDraft, format: OutputFormat) -> CommandResult {
    let record = issue(target, draft)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!("Issued {}", record.number);
            println!("  Customer: {}", record.customer_name);
            println!("  Subtotal: {:.2}", record.subtotal());
            println!("  IVA:      {:.2}", record.tax_amount());
            if record.discount > 0.0 {
                println!("  Discount: {:.2}", record.discount);
            }
            println!("  Total:    {:.2}", record.total());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::directory_target;
    use crate::commands::Layout;

    #[test]
    fn item_parsing() {
        let item = parse_item("2:Balata delantera: juego:350.5").unwrap();
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.description, "Balata delantera: juego");
        assert_eq!(item.unit_price, 350.5);

        assert!(parse_item("2:Balata").is_err());
        assert!(parse_item("dos:Balata:10").is_err());
    }

    #[test]
    fn draft_defaults_to_today() {
        let draft = build_draft(DraftArgs {
            customer: "Ana".into(),
            ..DraftArgs::default()
        });
        assert_eq!(draft.date, chrono::Local::now().date_naive());
        assert!(draft.tax_rate.is_none());
    }

    #[test]
    fn issues_consecutive_numbers() {
        let (_dir, target) = directory_target(Layout::Combined);
        let draft = build_draft(DraftArgs {
            customer: "Taller Ruiz".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1),
            items: vec![LineItem::new(2.0, "Balata", 100.0)],
            ..DraftArgs::default()
        });

        let first = issue(&target, &draft).unwrap();
        let second = issue(&target, &draft).unwrap();
        assert_eq!(first.number.to_string(), "00000001");
        assert_eq!(second.number.to_string(), "00000002");
        assert!((first.total() - 232.0).abs() < 1e-9);
    }

    #[test]
    fn json_draft_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(
            &path,
            r#"{"fecha":"2024-06-01","cliente":"Ana","conceptos":[{"cantidad":1,"descripcion":"Filtro","pu":80}]}"#,
        )
        .unwrap();
        let draft = read_draft(&path).unwrap();
        assert_eq!(draft.customer_name, "Ana");
        assert_eq!(draft.line_items.len(), 1);
    }
}
