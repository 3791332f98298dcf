use crate::error::Result;
use crate::types::{Contact, LedgerEntry};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Persistent record of who has already been welcomed. Append-only in effect:
/// entries are merged in, never removed, and an existing entry's date never
/// changes.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (or create) the ledger at `path`. A missing file is the first-run
    /// case, not an error; an unreadable or corrupt file is fatal.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS welcome_ledger (
                callsign     TEXT PRIMARY KEY,
                notified_on  TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Load the full notification history, keyed by callsign.
    pub fn load(&self) -> Result<HashMap<String, LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT callsign, notified_on FROM welcome_ledger")?;
        let mut rows = stmt.query([])?;

        let mut entries = HashMap::new();
        while let Some(row) = rows.next()? {
            let callsign: String = row.get(0)?;
            let notified_on: String = row.get(1)?;
            let notified_on = NaiveDate::parse_from_str(&notified_on, "%Y-%m-%d")
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
            entries.insert(
                callsign.clone(),
                LedgerEntry {
                    callsign,
                    notified_on,
                },
            );
        }
        debug!("Loaded {} ledger entries", entries.len());
        Ok(entries)
    }

    /// Merge newly notified callsigns into the ledger, in one transaction.
    /// Existing entries win: a callsign already present keeps its original
    /// date, so history is never rewritten by a replayed batch.
    pub fn commit(&mut self, newly_notified: &[(String, NaiveDate)]) -> Result<()> {
        if newly_notified.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for (callsign, notified_on) in newly_notified {
            tx.execute(
                "INSERT INTO welcome_ledger (callsign, notified_on) VALUES (?1, ?2)
                 ON CONFLICT(callsign) DO NOTHING",
                params![callsign, notified_on.format("%Y-%m-%d").to_string()],
            )?;
        }
        tx.commit()?;
        info!("Committed {} new ledger entries", newly_notified.len());
        Ok(())
    }
}

/// The subset of a batch not yet present in the ledger.
pub fn work_list(
    contacts: Vec<Contact>,
    ledger: &HashMap<String, LedgerEntry>,
) -> Vec<Contact> {
    contacts
        .into_iter()
        .filter(|c| !ledger.contains_key(&c.callsign))
        .collect()
}
