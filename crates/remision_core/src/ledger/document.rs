//! Ledger over a versioned document backend.

use super::{Ledger, LedgerAdapter, Token, TransactionalLedger, Versioned};
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::types::SequenceNumber;
use remision_storage::{DocumentBackend, Version};
use serde::{Deserialize, Serialize};

/// Default name of the counter document in the split layout.
pub const COUNTER_DOCUMENT: &str = "secuencia.json";
/// Default name of the history document in the split layout.
pub const HISTORY_DOCUMENT: &str = "historial.json";
/// Default name of the single document in the combined layout.
pub const LEDGER_DOCUMENT: &str = "ledger.json";

/// How counter and records map onto documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLayout {
    /// Counter and history in two independently versioned documents.
    ///
    /// This is the layout of existing repositories. It is not
    /// transactional: the issuer reserves the number on the counter first
    /// and appends the record afterwards.
    Split {
        /// Counter document, `{"ultima": "00000042"}`.
        counter: String,
        /// History document, a JSON array of records, newest first.
        history: String,
    },
    /// Counter and history in one document, written atomically.
    Combined {
        /// Ledger document, `{"ultima": ..., "remisiones": [...]}`.
        ledger: String,
    },
}

impl DocumentLayout {
    /// The split layout with the standard document names.
    #[must_use]
    pub fn split() -> Self {
        Self::Split {
            counter: COUNTER_DOCUMENT.to_string(),
            history: HISTORY_DOCUMENT.to_string(),
        }
    }

    /// The combined layout with the standard document name.
    #[must_use]
    pub fn combined() -> Self {
        Self::Combined {
            ledger: LEDGER_DOCUMENT.to_string(),
        }
    }

    /// Returns true for the combined layout.
    #[must_use]
    pub fn is_transactional(&self) -> bool {
        matches!(self, Self::Combined { .. })
    }
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self::split()
    }
}

#[derive(Serialize, Deserialize)]
struct CounterDoc {
    ultima: SequenceNumber,
}

#[derive(Serialize, Deserialize)]
struct LedgerDoc {
    ultima: SequenceNumber,
    #[serde(default)]
    remisiones: Vec<Record>,
}

/// A [`LedgerAdapter`] storing JSON documents in a [`DocumentBackend`].
///
/// Tokens are the backend's document versions, so any backend with
/// compare-and-swap puts (in memory, a local directory, a repository
/// contents API) can hold a ledger.
#[derive(Debug)]
pub struct DocumentLedger<B> {
    backend: B,
    layout: DocumentLayout,
}

impl<B: DocumentBackend> DocumentLedger<B> {
    /// Creates a ledger with an explicit layout.
    pub fn new(backend: B, layout: DocumentLayout) -> Self {
        Self { backend, layout }
    }

    /// Creates a ledger in the split layout.
    pub fn split(backend: B) -> Self {
        Self::new(backend, DocumentLayout::split())
    }

    /// Creates a ledger in the combined layout.
    pub fn combined(backend: B) -> Self {
        Self::new(backend, DocumentLayout::combined())
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the layout.
    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, name: &str) -> CoreResult<Option<(T, Token)>> {
        match self.backend.get(name)? {
            Some(doc) => {
                let value = serde_json::from_slice(&doc.content)?;
                Ok(Some((value, Token::new(doc.version.as_str()))))
            }
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T, expected: &Token) -> CoreResult<Token> {
        let content = serde_json::to_vec_pretty(value)?;
        let expected = expected.as_str().map(Version::new);
        let version = self.backend.put(name, &content, expected.as_ref())?;
        tracing::trace!(document = name, version = %version, "document written");
        Ok(Token::new(version.as_str()))
    }

    fn read_combined(&self, name: &str) -> CoreResult<Versioned<Ledger>> {
        Ok(match self.read_json::<LedgerDoc>(name)? {
            Some((doc, token)) => Versioned::new(
                Ledger {
                    counter: doc.ultima,
                    records: doc.remisiones,
                },
                token,
            ),
            None => Versioned::new(Ledger::default(), Token::absent()),
        })
    }

    fn write_combined(&self, name: &str, ledger: &Ledger, expected: &Token) -> CoreResult<Token> {
        let doc = LedgerDoc {
            ultima: ledger.counter,
            remisiones: newest_first(&ledger.records),
        };
        self.write_json(name, &doc, expected)
    }

    /// Reads the combined document and rejects a stale token before
    /// rewriting one half of it.
    fn read_combined_at(&self, name: &str, expected: &Token) -> CoreResult<Ledger> {
        let current = self.read_combined(name)?;
        if &current.token != expected {
            return Err(CoreError::conflict(name));
        }
        Ok(current.value)
    }
}

fn newest_first(records: &[Record]) -> Vec<Record> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.number.cmp(&a.number));
    sorted
}

impl<B: DocumentBackend> LedgerAdapter for DocumentLedger<B> {
    fn read_counter(&self) -> CoreResult<Versioned<SequenceNumber>> {
        match &self.layout {
            DocumentLayout::Split { counter, .. } => {
                Ok(match self.read_json::<CounterDoc>(counter)? {
                    Some((doc, token)) => Versioned::new(doc.ultima, token),
                    None => Versioned::new(SequenceNumber::ZERO, Token::absent()),
                })
            }
            DocumentLayout::Combined { ledger } => {
                let read = self.read_combined(ledger)?;
                Ok(Versioned::new(read.value.counter, read.token))
            }
        }
    }

    fn write_counter(&self, value: SequenceNumber, expected: &Token) -> CoreResult<Token> {
        match &self.layout {
            DocumentLayout::Split { counter, .. } => {
                self.write_json(counter, &CounterDoc { ultima: value }, expected)
            }
            DocumentLayout::Combined { ledger } => {
                let mut current = self.read_combined_at(ledger, expected)?;
                current.counter = value;
                self.write_combined(ledger, &current, expected)
            }
        }
    }

    fn read_records(&self) -> CoreResult<Versioned<Vec<Record>>> {
        match &self.layout {
            DocumentLayout::Split { history, .. } => {
                Ok(match self.read_json::<Vec<Record>>(history)? {
                    Some((records, token)) => Versioned::new(records, token),
                    None => Versioned::new(Vec::new(), Token::absent()),
                })
            }
            DocumentLayout::Combined { ledger } => {
                let read = self.read_combined(ledger)?;
                Ok(Versioned::new(read.value.records, read.token))
            }
        }
    }

    fn write_records(&self, records: &[Record], expected: &Token) -> CoreResult<Token> {
        match &self.layout {
            DocumentLayout::Split { history, .. } => {
                self.write_json(history, &newest_first(records), expected)
            }
            DocumentLayout::Combined { ledger } => {
                let mut current = self.read_combined_at(ledger, expected)?;
                current.records = records.to_vec();
                self.write_combined(ledger, &current, expected)
            }
        }
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalLedger> {
        if self.layout.is_transactional() {
            Some(self)
        } else {
            None
        }
    }
}

impl<B: DocumentBackend> TransactionalLedger for DocumentLedger<B> {
    fn read_ledger(&self) -> CoreResult<Versioned<Ledger>> {
        match &self.layout {
            DocumentLayout::Combined { ledger } => self.read_combined(ledger),
            DocumentLayout::Split { .. } => Err(CoreError::invalid_operation(
                "split document layout cannot be read as one ledger",
            )),
        }
    }

    fn write_ledger(&self, ledger: &Ledger, expected: &Token) -> CoreResult<Token> {
        match &self.layout {
            DocumentLayout::Combined { ledger: name } => self.write_combined(name, ledger, expected),
            DocumentLayout::Split { .. } => Err(CoreError::invalid_operation(
                "split document layout cannot be written as one ledger",
            )),
        }
    }
}
