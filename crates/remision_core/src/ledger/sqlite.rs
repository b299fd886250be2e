//! Ledger in a SQLite database.

use super::{Ledger, LedgerAdapter, Token, TransactionalLedger, Versioned};
use crate::error::{CoreError, CoreResult};
use crate::record::{round_cents, LineItem, Record};
use crate::types::SequenceNumber;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS secuencia (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    ultima TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS remisiones (
    remision TEXT PRIMARY KEY,
    fecha TEXT NOT NULL,
    cliente TEXT NOT NULL,
    ciudad TEXT NOT NULL DEFAULT '',
    conceptos TEXT NOT NULL,
    subtotal REAL NOT NULL,
    tasa_iva REAL NOT NULL,
    iva REAL NOT NULL,
    descuento REAL NOT NULL DEFAULT 0,
    total REAL NOT NULL,
    email TEXT,
    solicitud TEXT,
    deleted INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS ledger_meta (
    resource TEXT PRIMARY KEY,
    version INTEGER NOT NULL
);
INSERT OR IGNORE INTO ledger_meta (resource, version) VALUES ('counter', 0), ('records', 0);
";

const COUNTER: &str = "counter";
const RECORDS: &str = "records";

/// A transactional [`LedgerAdapter`] backed by SQLite.
///
/// Counter and records live in the `secuencia` and `remisiones` tables.
/// `ledger_meta` holds a version per resource, bumped by every write, which
/// serves as the concurrency token. Writes run in `IMMEDIATE` transactions,
/// so several processes can share one database file.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger").finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Opens or creates a database file.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        // Busy timeout first: switching to WAL itself may wait on other openers.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        migrate(&conn)?;
        tracing::debug!("sqlite ledger schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` inside an `IMMEDIATE` transaction and commits on success.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> CoreResult<T>) -> CoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` inside a deferred transaction for a consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> CoreResult<T>) -> CoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Adds columns introduced after a database was created.
fn migrate(conn: &Connection) -> CoreResult<()> {
    let has_request_id: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('remisiones') WHERE name = 'solicitud'",
        [],
        |row| row.get(0),
    )?;
    if !has_request_id {
        conn.execute("ALTER TABLE remisiones ADD COLUMN solicitud TEXT", [])?;
        tracing::info!("sqlite ledger migrated: remisiones.solicitud added");
    }
    Ok(())
}

fn version(tx: &Transaction<'_>, resource: &str) -> CoreResult<i64> {
    Ok(tx.query_row(
        "SELECT version FROM ledger_meta WHERE resource = ?1",
        [resource],
        |row| row.get(0),
    )?)
}

fn bump(tx: &Transaction<'_>, resource: &str) -> CoreResult<i64> {
    tx.execute(
        "UPDATE ledger_meta SET version = version + 1 WHERE resource = ?1",
        [resource],
    )?;
    version(tx, resource)
}

fn check(tx: &Transaction<'_>, resource: &str, expected: Option<&str>) -> CoreResult<()> {
    let current = version(tx, resource)?.to_string();
    if expected == Some(current.as_str()) {
        Ok(())
    } else {
        Err(CoreError::conflict(format!("sqlite {resource}")))
    }
}

fn ledger_token(counter: i64, records: i64) -> Token {
    Token::new(format!("{counter}:{records}"))
}

fn load_counter(tx: &Transaction<'_>) -> CoreResult<SequenceNumber> {
    let raw: Option<String> = tx
        .query_row("SELECT ultima FROM secuencia WHERE id = 1", [], |row| row.get(0))
        .optional()?;
    match raw {
        Some(raw) => raw.parse(),
        None => Ok(SequenceNumber::ZERO),
    }
}

fn store_counter(tx: &Transaction<'_>, value: SequenceNumber) -> CoreResult<()> {
    tx.execute(
        "INSERT INTO secuencia (id, ultima) VALUES (1, ?1)
         ON CONFLICT (id) DO UPDATE SET ultima = excluded.ultima",
        [value.to_string()],
    )?;
    Ok(())
}

struct RecordRow {
    remision: String,
    fecha: String,
    cliente: String,
    ciudad: String,
    conceptos: String,
    tasa_iva: f64,
    descuento: f64,
    email: Option<String>,
    solicitud: Option<String>,
    deleted: bool,
}

impl RecordRow {
    fn into_record(self) -> CoreResult<Record> {
        let date = NaiveDate::parse_from_str(&self.fecha, "%Y-%m-%d").map_err(|e| {
            CoreError::inconsistent(format!("record {} has bad date {:?}: {e}", self.remision, self.fecha))
        })?;
        let line_items: Vec<LineItem> = serde_json::from_str(&self.conceptos)?;
        Ok(Record {
            number: self.remision.parse()?,
            date,
            customer_name: self.cliente,
            city: self.ciudad,
            line_items,
            tax_rate: self.tasa_iva,
            discount: self.descuento,
            email: self.email,
            request_id: self.solicitud,
            deleted: self.deleted,
        })
    }
}

fn load_records(tx: &Transaction<'_>) -> CoreResult<Vec<Record>> {
    let mut stmt = tx.prepare(
        "SELECT remision, fecha, cliente, ciudad, conceptos, tasa_iva, descuento, email, solicitud, deleted
         FROM remisiones
         ORDER BY remision DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RecordRow {
            remision: row.get(0)?,
            fecha: row.get(1)?,
            cliente: row.get(2)?,
            ciudad: row.get(3)?,
            conceptos: row.get(4)?,
            tasa_iva: row.get(5)?,
            descuento: row.get(6)?,
            email: row.get(7)?,
            solicitud: row.get(8)?,
            deleted: row.get::<_, i64>(9)? != 0,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

fn store_records(tx: &Transaction<'_>, records: &[Record]) -> CoreResult<()> {
    tx.execute("DELETE FROM remisiones", [])?;
    let mut stmt = tx.prepare(
        "INSERT INTO remisiones
            (remision, fecha, cliente, ciudad, conceptos, subtotal, tasa_iva, iva, descuento, total, email, solicitud, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for record in records {
        stmt.execute(params![
            record.number.to_string(),
            record.date.format("%Y-%m-%d").to_string(),
            record.customer_name,
            record.city,
            serde_json::to_string(&record.line_items)?,
            round_cents(record.subtotal()),
            record.tax_rate,
            round_cents(record.tax_amount()),
            record.discount,
            round_cents(record.total()),
            record.email,
            record.request_id,
            i64::from(record.deleted),
        ])?;
    }
    Ok(())
}

impl LedgerAdapter for SqliteLedger {
    fn read_counter(&self) -> CoreResult<Versioned<SequenceNumber>> {
        self.read(|tx| {
            let value = load_counter(tx)?;
            Ok(Versioned::new(value, Token::new(version(tx, COUNTER)?.to_string())))
        })
    }

    fn write_counter(&self, value: SequenceNumber, expected: &Token) -> CoreResult<Token> {
        self.write(|tx| {
            check(tx, COUNTER, expected.as_str())?;
            store_counter(tx, value)?;
            Ok(Token::new(bump(tx, COUNTER)?.to_string()))
        })
    }

    fn read_records(&self) -> CoreResult<Versioned<Vec<Record>>> {
        self.read(|tx| {
            let records = load_records(tx)?;
            Ok(Versioned::new(records, Token::new(version(tx, RECORDS)?.to_string())))
        })
    }

    fn write_records(&self, records: &[Record], expected: &Token) -> CoreResult<Token> {
        self.write(|tx| {
            check(tx, RECORDS, expected.as_str())?;
            store_records(tx, records)?;
            Ok(Token::new(bump(tx, RECORDS)?.to_string()))
        })
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalLedger> {
        Some(self)
    }
}

impl TransactionalLedger for SqliteLedger {
    fn read_ledger(&self) -> CoreResult<Versioned<Ledger>> {
        self.read(|tx| {
            let ledger = Ledger {
                counter: load_counter(tx)?,
                records: load_records(tx)?,
            };
            let token = ledger_token(version(tx, COUNTER)?, version(tx, RECORDS)?);
            Ok(Versioned::new(ledger, token))
        })
    }

    fn write_ledger(&self, ledger: &Ledger, expected: &Token) -> CoreResult<Token> {
        self.write(|tx| {
            let current = ledger_token(version(tx, COUNTER)?, version(tx, RECORDS)?);
            if &current != expected {
                return Err(CoreError::conflict("sqlite ledger"));
            }
            store_counter(tx, ledger.counter)?;
            store_records(tx, &ledger.records)?;
            Ok(ledger_token(bump(tx, COUNTER)?, bump(tx, RECORDS)?))
        })
    }
}
