// src/db/history.rs

//! Append-only snapshot history per order reference number.

use rusqlite::TransactionBehavior;
use tracing::{debug, warn};

use crate::db::connection::Database;
use crate::db::kv;
use crate::domain::order::Snapshot;
use crate::errors::ServerError;

pub fn history_key(reference_number: &str) -> String {
    format!("history:{reference_number}")
}

pub trait HistoryStore {
    /// Snapshots oldest first. Unreadable or corrupt histories come back empty.
    fn load_history(&self, reference_number: &str) -> Vec<Snapshot>;

    /// Store `snapshot` as the new last element of the order's history.
    fn append_snapshot(&self, reference_number: &str, snapshot: &Snapshot)
        -> Result<(), ServerError>;

    fn latest_snapshot(&self, reference_number: &str) -> Option<Snapshot> {
        self.load_history(reference_number).pop()
    }
}

fn decode_history(raw: &str) -> Result<Vec<Snapshot>, ServerError> {
    serde_json::from_str(raw).map_err(|e| ServerError::DbError(format!("corrupt history: {e}")))
}

pub struct SqliteHistoryStore {
    db: Database,
}

impl SqliteHistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn read(&self, reference_number: &str) -> Result<Vec<Snapshot>, ServerError> {
        let key = history_key(reference_number);
        let raw = self.db.with_conn(|conn| kv::get(conn, &key))?;
        match raw {
            Some(raw) => decode_history(&raw),
            None => Ok(Vec::new()),
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_history(&self, reference_number: &str) -> Vec<Snapshot> {
        self.read(reference_number).unwrap_or_else(|e| {
            warn!(reference_number, error = %e, "failed to load history, treating as empty");
            Vec::new()
        })
    }

    fn append_snapshot(
        &self,
        reference_number: &str,
        snapshot: &Snapshot,
    ) -> Result<(), ServerError> {
        let key = history_key(reference_number);

        self.db.with_conn(|conn| {
            // IMMEDIATE takes the write lock up front so concurrent appenders
            // queue behind each other instead of losing an element.
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| ServerError::DbError(e.to_string()))?;

            // A corrupt value is left alone: rewriting it would drop history.
            let mut history = match kv::get(&tx, &key)? {
                Some(raw) => decode_history(&raw)?,
                None => Vec::new(),
            };
            history.push(snapshot.clone());

            let encoded = serde_json::to_string(&history)
                .map_err(|e| ServerError::DbError(format!("encode history failed: {e}")))?;
            kv::set(&tx, &key, &encoded, snapshot.timestamp)?;

            tx.commit()
                .map_err(|e| ServerError::DbError(e.to_string()))?;

            debug!(reference_number, len = history.len(), "snapshot appended");
            Ok(())
        })
    }
}

#[cfg(test)]
pub use memory::MemoryHistoryStore;
