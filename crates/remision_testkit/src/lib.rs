//! # Remision Testkit
//!
//! Test utilities for the remision ledger.
//!
//! This crate provides:
//! - Ledger fixtures over every adapter, with automatic cleanup
//! - Property-based test generators using proptest
//! - A fault-injecting document backend
//! - An in-process fake of the repository contents API
//! - Concurrent issuing stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use remision_testkit::prelude::*;
//!
//! with_each_ledger(|ledger| {
//!     let record = ledger.issuer().issue(&scenarios::draft("Ana")).unwrap();
//!     assert_eq!(record.number.to_string(), "00000001");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contents;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contents::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use contents::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
