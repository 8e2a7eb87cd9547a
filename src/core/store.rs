//! Store handle for the workflow database.
//!
//! Every component receives a `&Store` explicitly; there is no process-wide connection.
//! All state access routes through `with_write`/`with_read`, which emit one tracing
//! event per operation.

use crate::core::db;
use crate::core::error::WorkflowError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Private to this handle; dropped with it. Used for isolated tests.
    InMemory,
    File(PathBuf),
}

pub struct Store {
    conn: Connection,
    location: StoreLocation,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location)
            .finish()
    }
}

impl Store {
    pub fn open(path: &Path, busy_timeout_secs: u64) -> Result<Self, WorkflowError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = db::db_connect(&path.to_string_lossy(), busy_timeout_secs)?;
        db::initialize_schema(&conn)?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self {
            conn,
            location: StoreLocation::File(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, WorkflowError> {
        let conn = db::db_connect_in_memory()?;
        db::initialize_schema(&conn)?;
        Ok(Self {
            conn,
            location: StoreLocation::InMemory,
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Raw connection. Writes through it skip enforcement; reserved for the
    /// repository layer, maintenance paths and tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn with_write<F, R>(&self, op_name: &str, f: F) -> Result<R, WorkflowError>
    where
        F: FnOnce(&Connection) -> Result<R, WorkflowError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                tracing::debug!(op = op_name, status = "success", "store write");
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back; surface the original error.
                drop(tx);
                tracing::debug!(op = op_name, status = "error", code = e.code(), "store write");
                Err(e)
            }
        }
    }

    pub fn with_read<F, R>(&self, op_name: &str, f: F) -> Result<R, WorkflowError>
    where
        F: FnOnce(&Connection) -> Result<R, WorkflowError>,
    {
        let result = f(&self.conn);
        let status = if result.is_ok() { "success" } else { "error" };
        tracing::trace!(op = op_name, status, "store read");
        result
    }
}
