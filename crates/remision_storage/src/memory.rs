//! In-memory document backend for testing.

use crate::backend::{check_expected, Document, DocumentBackend, Version};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory document backend.
///
/// This backend stores all documents in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral ledgers that don't need persistence
///
/// # Thread Safety
///
/// The version check and the replacement happen under one write lock, so
/// concurrent writers racing on the same version see exactly one winner.
///
/// # Example
///
/// ```rust
/// use remision_storage::{DocumentBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// let v1 = backend.put("ledger.json", b"1", None).unwrap();
/// let v2 = backend.put("ledger.json", b"2", Some(&v1)).unwrap();
/// assert!(backend.put("ledger.json", b"3", Some(&v1)).is_err());
/// assert_eq!(backend.get("ledger.json").unwrap().unwrap().version, v2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing documents.
    ///
    /// Useful for testing recovery and legacy-data scenarios.
    #[must_use]
    pub fn with_documents<I, N>(documents: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        Self {
            documents: RwLock::new(
                documents
                    .into_iter()
                    .map(|(name, content)| (name.into(), content))
                    .collect(),
            ),
        }
    }

    /// Returns the names of all stored documents.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }

    /// Removes every document.
    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

impl DocumentBackend for InMemoryBackend {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        Ok(self.documents.read().get(name).map(|content| Document {
            version: Version::of(content),
            content: content.clone(),
        }))
    }

    fn put(
        &self,
        name: &str,
        content: &[u8],
        expected: Option<&Version>,
    ) -> StorageResult<Version> {
        let mut documents = self.documents.write();
        let current = documents.get(name).map(|c| Version::of(c));
        check_expected(name, current.as_ref(), expected)?;

        documents.insert(name.to_string(), content.to_vec());
        Ok(Version::of(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.names().is_empty());
        assert!(backend.get("missing").unwrap().is_none());
    }

    #[test]
    fn memory_create_then_read() {
        let backend = InMemoryBackend::new();
        let version = backend.put("a.json", b"hello", None).unwrap();

        let doc = backend.get("a.json").unwrap().unwrap();
        assert_eq!(doc.content, b"hello");
        assert_eq!(doc.version, version);
    }

    #[test]
    fn memory_create_twice_conflicts() {
        let backend = InMemoryBackend::new();
        backend.put("a.json", b"one", None).unwrap();

        let result = backend.put("a.json", b"two", None);
        assert!(matches!(result, Err(StorageError::Conflict { .. })));
        assert_eq!(backend.get("a.json").unwrap().unwrap().content, b"one");
    }

    #[test]
    fn memory_stale_version_conflicts() {
        let backend = InMemoryBackend::new();
        let v1 = backend.put("a.json", b"one", None).unwrap();
        backend.put("a.json", b"two", Some(&v1)).unwrap();

        let result = backend.put("a.json", b"three", Some(&v1));
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(backend.get("a.json").unwrap().unwrap().content, b"two");
    }

    #[test]
    fn memory_with_documents() {
        let backend = InMemoryBackend::with_documents([("x.json", b"{}".to_vec())]);
        assert_eq!(backend.names(), vec!["x.json".to_string()]);
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::new();
        backend.put("a.json", b"data", None).unwrap();
        backend.clear();
        assert!(backend.get("a.json").unwrap().is_none());
    }

    #[test]
    fn memory_racing_writers_have_one_winner() {
        let backend = Arc::new(InMemoryBackend::new());
        let base = backend.put("counter", b"0", None).unwrap();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                let base = base.clone();
                thread::spawn(move || backend.put("counter", &[b'1' + i], Some(&base)).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
