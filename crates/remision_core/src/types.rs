//! Core type definitions.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of digits in a rendered document number.
pub const SEQUENCE_WIDTH: usize = 8;

/// Largest document number representable in [`SEQUENCE_WIDTH`] digits.
pub const SEQUENCE_MAX: u64 = 99_999_999;

/// A document number ("remisión" number).
///
/// Rendered as an 8-digit zero-padded decimal string, which makes string
/// order equal numeric order. The same type is used for the counter's
/// `last_issued` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The counter value before anything has been issued.
    pub const ZERO: Self = Self(0);

    /// Creates a sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SequenceOverflow`] if `value` needs more than
    /// eight digits.
    pub fn new(value: u64) -> CoreResult<Self> {
        if value > SEQUENCE_MAX {
            return Err(CoreError::SequenceOverflow);
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the number following this one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SequenceOverflow`] past `99999999`.
    pub fn next(self) -> CoreResult<Self> {
        Self::new(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = SEQUENCE_WIDTH)
    }
}

impl FromStr for SequenceNumber {
    type Err = CoreError;

    /// Parses a decimal string. Shorter, unpadded input is accepted;
    /// anything but ASCII digits is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::validation(format!(
                "invalid document number {s:?}"
            )));
        }
        let significant = digits.trim_start_matches('0');
        if significant.len() > SEQUENCE_WIDTH {
            return Err(CoreError::SequenceOverflow);
        }
        let value = if significant.is_empty() {
            0
        } else {
            significant
                .parse::<u64>()
                .map_err(|e| CoreError::validation(format!("invalid document number {s:?}: {e}")))?
        };
        Self::new(value)
    }
}

impl Serialize for SequenceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SequenceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordering for record listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first (highest number first).
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}
