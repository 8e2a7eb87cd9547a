//! Two-step confirmation for destructive actions.
//!
//! Step one issues a single-use token bound to an action and an entity. Step two
//! presents the token with the literal confirmation word. Consumption lands in the
//! write-once `used_tokens` set inside the caller's transaction, so the token is spent
//! only if the guarded effect commits.

use crate::core::error::{Result, WorkflowError};
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

pub const TOKEN_PREFIX: &str = "CT";
/// Entity id used for store-wide actions.
pub const STORE_ENTITY_ID: &str = "store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmAction {
    ClosePhase,
    LockDecision,
    Restore,
}

impl ConfirmAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmAction::ClosePhase => "CLOSE_PHASE",
            ConfirmAction::LockDecision => "LOCK_DECISION",
            ConfirmAction::Restore => "RESTORE",
        }
    }

    /// The word the caller must type, exactly.
    pub fn literal(self) -> &'static str {
        match self {
            ConfirmAction::ClosePhase => "CLOSE",
            ConfirmAction::LockDecision => "LOCK",
            ConfirmAction::Restore => "RESTORE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub token: String,
    pub action: ConfirmAction,
    pub entity_id: String,
    pub expires_at: i64,
    /// Echoed so the caller knows what to type.
    pub confirmation: String,
}

pub struct TokenGate<'c> {
    conn: &'c Connection,
    ttl_secs: u64,
}

impl<'c> TokenGate<'c> {
    pub fn new(conn: &'c Connection, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    pub fn issue(&self, action: ConfirmAction, entity_id: &str) -> Result<ConfirmationToken> {
        let token = time::new_id(TOKEN_PREFIX);
        let issued_at = time::now_millis();
        let ttl_millis = i64::try_from(self.ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let expires_at = issued_at.saturating_add(ttl_millis);
        self.conn.execute(
            "INSERT INTO issued_tokens(token, action, entity_id, issued_at, expires_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![token, action.as_str(), entity_id, issued_at, expires_at],
        )?;
        tracing::info!(action = action.as_str(), entity_id, "confirmation token issued");
        Ok(ConfirmationToken {
            token,
            action,
            entity_id: entity_id.to_string(),
            expires_at,
            confirmation: action.literal().to_string(),
        })
    }

    pub fn is_used(&self, token: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM used_tokens WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fails with `TokenAlreadyUsed` for a spent token. Confirm paths call this before
    /// looking at the guarded entity, so a replay is reported as a replay even after the
    /// first use changed that entity's state.
    pub fn ensure_unspent(
        &self,
        action: ConfirmAction,
        entity_id: &str,
        token: &str,
    ) -> Result<()> {
        if self.is_used(token)? {
            tracing::warn!(action = action.as_str(), entity_id, "confirmation token replayed");
            return Err(WorkflowError::TokenAlreadyUsed);
        }
        Ok(())
    }

    /// Check order: replay, binding, expiry, literal. A failed check spends nothing.
    /// A successful consume drops the token's issued row along with any expired ones.
    pub fn consume(
        &self,
        action: ConfirmAction,
        entity_id: &str,
        token: &str,
        literal: &str,
    ) -> Result<()> {
        self.ensure_unspent(action, entity_id, token)?;

        let issued: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT action, entity_id, expires_at FROM issued_tokens WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let invalid = || WorkflowError::TokenInvalid {
            action: action.as_str().to_string(),
            entity_id: entity_id.to_string(),
        };
        let Some((issued_action, issued_entity, expires_at)) = issued else {
            return Err(invalid());
        };
        if issued_action != action.as_str() || issued_entity != entity_id {
            return Err(invalid());
        }
        if time::now_millis() > expires_at {
            return Err(WorkflowError::TokenExpired {
                expired_at: expires_at,
            });
        }
        if literal != action.literal() {
            return Err(WorkflowError::ConfirmationMismatch {
                expected: action.literal(),
            });
        }

        self.conn
            .execute(
                "INSERT INTO used_tokens(token, action, used_at) VALUES(?1, ?2, ?3)",
                params![token, action.as_str(), time::now_millis()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(code, _)
                    if code.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    WorkflowError::TokenAlreadyUsed
                }
                other => WorkflowError::RusqliteError(other),
            })?;
        let pruned = self.conn.execute(
            "DELETE FROM issued_tokens WHERE token = ?1 OR expires_at < ?2",
            params![token, time::now_millis()],
        )?;
        tracing::debug!(action = action.as_str(), entity_id, pruned, "confirmation token spent");
        Ok(())
    }
}
