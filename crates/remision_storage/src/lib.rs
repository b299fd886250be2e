//! # Remision Storage
//!
//! Versioned document backends for the remision ledger.
//!
//! This crate provides the lowest-level persistence abstraction. Backends
//! are **opaque document stores**: they hold named byte blobs and a version
//! token per blob, and they never interpret the bytes.
//!
//! ## Design Principles
//!
//! - A document is replaced as a whole, never patched in place
//! - Every write carries the version the writer last observed
//! - A stale version fails with [`StorageError::Conflict`] and writes nothing
//! - Must be `Send + Sync` for concurrent access
//! - The core crate owns all document format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral ledgers
//! - [`FileBackend`] - A directory of documents, replaced atomically
//! - [`RepoContentsBackend`] - Files in a hosted repository, written through
//!   a contents REST API
//!
//! ## Example
//!
//! ```rust
//! use remision_storage::{DocumentBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! let v1 = backend.put("secuencia.json", b"{}", None).unwrap();
//! let doc = backend.get("secuencia.json").unwrap().unwrap();
//! assert_eq!(doc.version, v1);
//!
//! // A second create with no expected version conflicts.
//! assert!(backend.put("secuencia.json", b"{}", None).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod contents;
mod error;
mod file;
mod memory;

pub use backend::{Document, DocumentBackend, Version};
pub use contents::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RepoConfig, RepoContentsBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
