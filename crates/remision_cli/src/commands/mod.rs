//! CLI command implementations.

pub mod customers;
pub mod init;
pub mod issue;
pub mod list;
pub mod next;
pub mod reconcile;
pub mod report;
pub mod update;

use clap::ValueEnum;
use remision_core::{DocumentLedger, LedgerAdapter, SqliteLedger};
use remision_storage::FileBackend;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Boxed error returned by every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Document layout of a ledger directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    /// `secuencia.json` and `historial.json`.
    Split,
    /// A single `ledger.json`.
    Combined,
}

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Where the ledger lives.
#[derive(Debug, Clone)]
pub struct LedgerTarget {
    /// Ledger directory.
    pub path: Option<PathBuf>,
    /// SQLite database file.
    pub sqlite: Option<PathBuf>,
    /// Layout inside `path`.
    pub layout: Layout,
}

impl LedgerTarget {
    /// Opens the ledger adapter for this target.
    pub fn open(&self) -> CommandResult<Arc<dyn LedgerAdapter>> {
        if let Some(db) = &self.sqlite {
            tracing::debug!(path = %db.display(), "opening sqlite ledger");
            let ledger: Arc<dyn LedgerAdapter> = Arc::new(SqliteLedger::open(db)?);
            return Ok(ledger);
        }
        let dir = self
            .path
            .as_ref()
            .ok_or("ledger location required: pass --path <DIR> or --sqlite <FILE>")?;
        tracing::debug!(path = %dir.display(), layout = ?self.layout, "opening document ledger");
        let backend = FileBackend::open(dir)?;
        let ledger: Arc<dyn LedgerAdapter> = match self.layout {
            Layout::Split => Arc::new(DocumentLedger::split(backend)),
            Layout::Combined => Arc::new(DocumentLedger::combined(backend)),
        };
        Ok(ledger)
    }
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
