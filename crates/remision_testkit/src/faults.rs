//! Fault injection for document backends.
//!
//! [`FaultyBackend`] wraps any [`DocumentBackend`] and fails chosen writes,
//! which exercises the paths between the counter write and the history
//! write that a healthy backend never reaches.
//!
//! ## Usage
//!
//! ```rust
//! use remision_core::{DocumentLedger, CoreError, Issuer};
//! use remision_storage::InMemoryBackend;
//! use remision_testkit::{faults::{Fault, FaultyBackend}, fast_config, scenarios};
//!
//! // The first history write fails after the counter was advanced.
//! let backend = FaultyBackend::new(InMemoryBackend::new())
//!     .with_put_failure("historial.json", 1, Fault::Io);
//! let issuer = Issuer::with_config(DocumentLedger::split(backend), fast_config());
//!
//! let err = issuer.issue(&scenarios::draft("Ana")).unwrap_err();
//! assert!(matches!(err, CoreError::OrphanedNumber { .. }));
//! ```

use parking_lot::Mutex;
use remision_storage::{Document, DocumentBackend, StorageError, StorageResult, Version};
use std::collections::HashMap;
use std::io;

/// The kind of failure injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reject the write as a version conflict.
    Conflict,
    /// Fail the write with an I/O error.
    Io,
}

impl Fault {
    fn into_error(self, name: &str) -> StorageError {
        match self {
            Fault::Conflict => StorageError::conflict(name, None, None),
            Fault::Io => StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected failure writing {name}"),
            )),
        }
    }
}

/// When a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Only the nth put to the document (1-based).
    Nth(usize),
    /// Every put from the nth on (1-based).
    From(usize),
}

impl Trigger {
    fn fires(self, count: usize) -> bool {
        match self {
            Trigger::Nth(n) => count == n,
            Trigger::From(n) => count >= n,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    document: String,
    trigger: Trigger,
    fault: Fault,
}

type PutHook<B> = Box<dyn FnMut(&str, &B) + Send>;

/// A backend that fails selected writes.
///
/// Reads always pass through. A failed put writes nothing, matching the
/// [`DocumentBackend`] contract.
pub struct FaultyBackend<B> {
    inner: B,
    rules: Vec<Rule>,
    puts: Mutex<HashMap<String, usize>>,
    hook: Mutex<Option<PutHook<B>>>,
}

impl<B: DocumentBackend> FaultyBackend<B> {
    /// Wraps `inner` with no faults.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            rules: Vec::new(),
            puts: Mutex::new(HashMap::new()),
            hook: Mutex::new(None),
        }
    }

    /// Fails the `nth` put (1-based) to `document`.
    #[must_use]
    pub fn with_put_failure(self, document: &str, nth: usize, fault: Fault) -> Self {
        self.with_rule(document, Trigger::Nth(nth), fault)
    }

    /// Fails every put to `document`.
    #[must_use]
    pub fn with_all_puts_failing(self, document: &str, fault: Fault) -> Self {
        self.with_rule(document, Trigger::From(1), fault)
    }

    /// Adds a rule.
    #[must_use]
    pub fn with_rule(mut self, document: &str, trigger: Trigger, fault: Fault) -> Self {
        self.rules.push(Rule {
            document: document.to_string(),
            trigger,
            fault,
        });
        self
    }

    /// Runs `hook` before every put, with direct access to the wrapped
    /// backend. Writing through that handle simulates a rival writer
    /// landing between a caller's read and its write.
    ///
    /// The hook must not call back into this backend.
    #[must_use]
    pub fn with_before_put<F>(self, hook: F) -> Self
    where
        F: FnMut(&str, &B) + Send + 'static,
    {
        *self.hook.lock() = Some(Box::new(hook));
        self
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Number of puts attempted on `document`, failed ones included.
    pub fn put_count(&self, document: &str) -> usize {
        self.puts.lock().get(document).copied().unwrap_or(0)
    }
}

impl<B: DocumentBackend> DocumentBackend for FaultyBackend<B> {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        self.inner.get(name)
    }

    fn put(&self, name: &str, content: &[u8], expected: Option<&Version>) -> StorageResult<Version> {
        let count = {
            let mut puts = self.puts.lock();
            let count = puts.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(hook) = self.hook.lock().as_mut() {
            hook(name, &self.inner);
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.document == name && rule.trigger.fires(count))
        {
            return Err(rule.fault.into_error(name));
        }
        self.inner.put(name, content, expected)
    }
}
