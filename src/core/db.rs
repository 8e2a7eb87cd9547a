use crate::core::error::{self, WorkflowError};
use crate::core::schemas;
use rusqlite::{Connection, params};
use std::time::Duration;

pub fn db_connect(db_path: &str, busy_timeout_secs: u64) -> Result<Connection, WorkflowError> {
    let conn = Connection::open(db_path)?;
    configure(&conn, busy_timeout_secs)?;
    // In-memory databases report "memory" here; only file stores get a write-ahead log.
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::WorkflowError::RusqliteError)?;
    Ok(conn)
}

pub fn db_connect_in_memory() -> Result<Connection, WorkflowError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, 0)?;
    Ok(conn)
}

fn configure(conn: &Connection, busy_timeout_secs: u64) -> Result<(), WorkflowError> {
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))
        .map_err(error::WorkflowError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::WorkflowError::RusqliteError)?;
    Ok(())
}

/// Create every table, index and trigger. Idempotent.
pub fn initialize_schema(conn: &Connection) -> Result<(), WorkflowError> {
    for statement in schemas::ALL_STATEMENTS {
        conn.execute_batch(statement)?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES('schema_version', ?1)",
        params![schemas::SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<u32, WorkflowError> {
    let raw: String = conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    raw.parse().map_err(|_| {
        WorkflowError::ValidationError(format!("corrupt schema_version '{}'", raw))
    })
}

/// True when `err` is the failsafe single-active-phase index rejecting a write.
pub fn is_single_active_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, Some(msg)) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
                && (msg.contains(schemas::SINGLE_ACTIVE_INDEX_NAME)
                    || msg.contains("phases.status"))
        }
        _ => false,
    }
}
