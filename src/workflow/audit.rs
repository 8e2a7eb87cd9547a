//! Append-only audit trail.
//!
//! `AuditLog` can append and query. It has no update or delete operation, and the
//! store carries triggers that abort either statement on `audit_log`.
//!
//! ```compile_fail
//! use phaselock::core::store::Store;
//! use phaselock::workflow::audit::AuditLog;
//!
//! let store = Store::open_in_memory().unwrap();
//! AuditLog::new(store.conn()).delete("AL_01ARZ3NDEKTSV4RRFFQ69G5FAV");
//! ```
//!
//! ```compile_fail
//! use phaselock::core::store::Store;
//! use phaselock::workflow::audit::AuditLog;
//!
//! let store = Store::open_in_memory().unwrap();
//! let log = AuditLog::new(store.conn());
//! let entry = log.recent(1).unwrap().remove(0);
//! log.update(&entry);
//! ```

use crate::core::error::{Result, WorkflowError};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const ID_PREFIX: &str = "AL";

const AUDIT_COLUMNS: &str =
    "id, entity_type, entity_id, action, old_state, new_state, metadata, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Transition,
    Snapshot,
    Restore,
    EnforcementViolation,
    IntegrityViolation,
}

impl AuditAction {
    pub const ALL: [AuditAction; 8] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::Transition,
        AuditAction::Snapshot,
        AuditAction::Restore,
        AuditAction::EnforcementViolation,
        AuditAction::IntegrityViolation,
    ];

    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                WorkflowError::ValidationError(format!("unknown audit action '{}'", value))
            })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Transition => "TRANSITION",
            AuditAction::Snapshot => "SNAPSHOT",
            AuditAction::Restore => "RESTORE",
            AuditAction::EnforcementViolation => "ENFORCEMENT_VIOLATION",
            AuditAction::IntegrityViolation => "INTEGRITY_VIOLATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub old_state: Option<String>,
    pub new_state: Option<String>,
    pub metadata: JsonValue,
    pub created_at: i64,
}

/// Entry to be appended; id and timestamp are assigned on append.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub action: AuditAction,
    pub old_state: Option<&'a str>,
    pub new_state: Option<&'a str>,
    pub metadata: JsonValue,
}

impl<'a> NewAuditEntry<'a> {
    pub fn new(entity_type: &'a str, entity_id: &'a str, action: AuditAction) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            old_state: None,
            new_state: None,
            metadata: serde_json::json!({}),
        }
    }

    pub fn states(mut self, old_state: Option<&'a str>, new_state: Option<&'a str>) -> Self {
        self.old_state = old_state;
        self.new_state = new_state;
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let raw_metadata: String = row.get(6)?;
    let metadata = serde_json::from_str(&raw_metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AuditEntry {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        action: row.get(3)?,
        old_state: row.get(4)?,
        new_state: row.get(5)?,
        metadata,
        created_at: row.get(7)?,
    })
}

pub struct AuditLog<'c> {
    conn: &'c Connection,
}

impl<'c> AuditLog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, entry: NewAuditEntry<'_>) -> Result<AuditEntry> {
        let id = time::new_id(ID_PREFIX);
        let created_at = time::now_millis();
        let metadata = serde_json::to_string(&entry.metadata).map_err(|e| {
            WorkflowError::ValidationError(format!("audit metadata is not serializable: {e}"))
        })?;
        self.conn.execute(
            "INSERT INTO audit_log(id, entity_type, entity_id, action, old_state, new_state, metadata, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                entry.entity_type,
                entry.entity_id,
                entry.action.as_str(),
                entry.old_state,
                entry.new_state,
                metadata,
                created_at,
            ],
        )?;
        Ok(AuditEntry {
            id,
            entity_type: entry.entity_type.to_string(),
            entity_id: entry.entity_id.to_string(),
            action: entry.action.as_str().to_string(),
            old_state: entry.old_state.map(str::to_string),
            new_state: entry.new_state.map(str::to_string),
            metadata: entry.metadata,
            created_at,
        })
    }

    pub fn get(&self, id: &str) -> Result<AuditEntry> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM audit_log WHERE id = ?1", AUDIT_COLUMNS),
                params![id],
                entry_from_row,
            )
            .optional()?
            .ok_or_else(|| WorkflowError::not_found("audit_log", id))
    }

    fn query(&self, where_clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT {} FROM audit_log {} ORDER BY seq",
            AUDIT_COLUMNS, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params, entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Oldest first.
    pub fn for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEntry>> {
        self.query(
            "WHERE entity_type = ?1 AND entity_id = ?2",
            &[&entity_type, &entity_id],
        )
    }

    pub fn by_action(&self, action: AuditAction) -> Result<Vec<AuditEntry>> {
        self.query("WHERE action = ?1", &[&action.as_str()])
    }

    /// Inclusive on both ends, in epoch milliseconds.
    pub fn in_range(&self, from_ms: i64, to_ms: i64) -> Result<Vec<AuditEntry>> {
        if from_ms > to_ms {
            return Err(WorkflowError::ValidationError(format!(
                "invalid range: {} > {}",
                from_ms, to_ms
            )));
        }
        self.query(
            "WHERE created_at >= ?1 AND created_at <= ?2",
            &[&from_ms, &to_ms],
        )
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM audit_log ORDER BY seq DESC LIMIT ?1",
            AUDIT_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![limit as i64], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type, entity_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
