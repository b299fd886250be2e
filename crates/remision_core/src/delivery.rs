//! PDF and e-mail delivery seams.
//!
//! Layout and transport live outside this crate; only the contract for
//! sending an issued document is fixed here.

use crate::error::{CoreError, CoreResult};
use crate::record::{validate_email, Record};

/// Renders a record to PDF bytes.
pub trait PdfRenderer: Send + Sync {
    /// Renders `record`.
    fn render(&self, record: &Record) -> CoreResult<Vec<u8>>;
}

/// Sends a rendered record by e-mail.
pub trait EmailRelay: Send + Sync {
    /// Sends `pdf` for `record` to `recipient`.
    fn send(&self, recipient: &str, record: &Record, pdf: &[u8]) -> CoreResult<()>;
}

/// Renders `record` and mails it.
///
/// The recipient is `recipient` if given, else the record's own address.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] without rendering if there is no
/// usable recipient or the record is deleted.
pub fn deliver(
    record: &Record,
    recipient: Option<&str>,
    renderer: &dyn PdfRenderer,
    relay: &dyn EmailRelay,
) -> CoreResult<()> {
    if record.deleted {
        return Err(CoreError::validation(format!(
            "document {} is deleted",
            record.number
        )));
    }
    let recipient = recipient
        .or(record.email.as_deref())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| CoreError::validation("an e-mail recipient is required"))?;
    validate_email(recipient)?;

    let pdf = renderer.render(record)?;
    relay.send(recipient, record, &pdf)?;
    tracing::info!(number = %record.number, bytes = pdf.len(), "document delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDraft;
    use crate::types::SequenceNumber;
    use chrono::NaiveDate;
    use parking_lot::Mutex;

    struct FakePdf;

    impl PdfRenderer for FakePdf {
        fn render(&self, record: &Record) -> CoreResult<Vec<u8>> {
            Ok(format!("%PDF {}", record.number).into_bytes())
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, Vec<u8>)>>);

    impl EmailRelay for Outbox {
        fn send(&self, recipient: &str, _record: &Record, pdf: &[u8]) -> CoreResult<()> {
            self.0.lock().push((recipient.to_string(), pdf.to_vec()));
            Ok(())
        }
    }

    fn record(email: Option<&str>) -> Record {
        let mut draft = RecordDraft::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "Ana")
            .with_item(1.0, "x", 1.0);
        if let Some(email) = email {
            draft = draft.with_email(email);
        }
        draft.to_record(SequenceNumber::new(12).unwrap(), 0.16)
    }

    #[test]
    fn delivers_to_record_address() {
        let outbox = Outbox::default();
        deliver(&record(Some("ana@example.com")), None, &FakePdf, &outbox).unwrap();
        let sent = outbox.0.lock();
        assert_eq!(sent[0].0, "ana@example.com");
        assert_eq!(sent[0].1, b"%PDF 00000012");
    }

    #[test]
    fn explicit_recipient_wins() {
        let outbox = Outbox::default();
        deliver(
            &record(Some("ana@example.com")),
            Some("contabilidad@example.com"),
            &FakePdf,
            &outbox,
        )
        .unwrap();
        assert_eq!(outbox.0.lock()[0].0, "contabilidad@example.com");
    }

    #[test]
    fn needs_recipient_and_active_record() {
        let outbox = Outbox::default();
        assert!(deliver(&record(None), None, &FakePdf, &outbox).is_err());

        let mut deleted = record(Some("ana@example.com"));
        deleted.deleted = true;
        assert!(deliver(&deleted, None, &FakePdf, &outbox).is_err());
        assert!(outbox.0.lock().is_empty());
    }
}
