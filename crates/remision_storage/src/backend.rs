//! Document backend trait definition.

use crate::error::StorageResult;
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque version token of a stored document.
///
/// Local backends derive it from the content (SHA-256, hex encoded); remote
/// backends carry whatever the service returns (a blob SHA for the contents
/// API). Callers must only compare versions for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Wraps a version string produced by a backend.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Computes the content-addressed version of `content`.
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Full document content.
    pub content: Vec<u8>,
    /// Version of this content.
    pub version: Version,
}

/// A versioned document store.
///
/// Backends are **opaque**: they store whole documents by name and hand out
/// a version token with every read. Writes are compare-and-swap on that
/// token.
///
/// # Invariants
///
/// - `put` replaces the whole document or nothing; a concurrent `get` never
///   observes a partially written document
/// - `put` with `expected = None` only succeeds if the document is absent
/// - `put` with `expected = Some(v)` only succeeds if the stored version is
///   `v`; otherwise it fails with [`crate::StorageError::Conflict`]
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For local persistent storage
/// - [`super::RepoContentsBackend`] - For repository-hosted documents
pub trait DocumentBackend: Send + Sync {
    /// Reads the named document, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, name: &str) -> StorageResult<Option<Document>>;

    /// Replaces the named document if its version still matches `expected`.
    ///
    /// Returns the version of the newly written content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Conflict`] on a version mismatch, or
    /// another error if the write itself fails. On error nothing is written.
    fn put(&self, name: &str, content: &[u8], expected: Option<&Version>)
        -> StorageResult<Version>;
}

impl<B: DocumentBackend + ?Sized> DocumentBackend for std::sync::Arc<B> {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        (**self).get(name)
    }

    fn put(
        &self,
        name: &str,
        content: &[u8],
        expected: Option<&Version>,
    ) -> StorageResult<Version> {
        (**self).put(name, content, expected)
    }
}

impl<B: DocumentBackend + ?Sized> DocumentBackend for &B {
    fn get(&self, name: &str) -> StorageResult<Option<Document>> {
        (**self).get(name)
    }

    fn put(
        &self,
        name: &str,
        content: &[u8],
        expected: Option<&Version>,
    ) -> StorageResult<Version> {
        (**self).put(name, content, expected)
    }
}

/// Checks a CAS precondition shared by local backends.
pub(crate) fn check_expected(
    name: &str,
    current: Option<&Version>,
    expected: Option<&Version>,
) -> StorageResult<()> {
    if current == expected {
        Ok(())
    } else {
        Err(crate::StorageError::conflict(
            name,
            expected.map(Version::as_str),
            current.map(Version::as_str),
        ))
    }
}
