//! Transition tables for every workflow entity.
//!
//! Each status enum lists its legal targets exhaustively. A status with no targets is
//! terminal. `validate_transition` errors name the legal targets, or `none`.

use crate::core::error::{Result, WorkflowError};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Lifecycle: Copy + Eq + fmt::Debug + 'static {
    /// Entity name used in errors and audit rows.
    const ENTITY: &'static str;
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    /// Legal targets from this status. Empty means terminal.
    fn targets(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.targets().is_empty()
    }

    fn can_transition(self, to: Self) -> bool {
        self.targets().contains(&to)
    }

    fn validate_transition(self, to: Self) -> Result<()> {
        if self.can_transition(to) {
            return Ok(());
        }
        let allowed = if self.is_terminal() {
            "none".to_string()
        } else {
            self.targets()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Err(WorkflowError::InvalidStateTransition {
            entity_type: Self::ENTITY,
            from: self.as_str().to_string(),
            to: to.as_str().to_string(),
            allowed,
        })
    }

    fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                WorkflowError::ValidationError(format!(
                    "unknown {} status '{}'. Valid: {}",
                    Self::ENTITY,
                    raw,
                    valid.join(", ")
                ))
            })
    }
}

fn status_from_sql<S: Lifecycle>(value: ValueRef<'_>) -> FromSqlResult<S> {
    let raw = value.as_str()?;
    S::parse(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdeaStatus {
    Parked,
    Promoted,
    Abandoned,
}

impl Lifecycle for IdeaStatus {
    const ENTITY: &'static str = "idea";
    const ALL: &'static [Self] = &[Self::Parked, Self::Promoted, Self::Abandoned];

    fn as_str(self) -> &'static str {
        match self {
            Self::Parked => "PARKED",
            Self::Promoted => "PROMOTED",
            Self::Abandoned => "ABANDONED",
        }
    }

    fn targets(self) -> &'static [Self] {
        match self {
            Self::Parked => &[Self::Promoted, Self::Abandoned],
            Self::Promoted | Self::Abandoned => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    Active,
    Closed,
    Abandoned,
}

impl Lifecycle for PhaseStatus {
    const ENTITY: &'static str = "phase";
    const ALL: &'static [Self] = &[Self::Active, Self::Closed, Self::Abandoned];

    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
            Self::Abandoned => "ABANDONED",
        }
    }

    fn targets(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Closed, Self::Abandoned],
            Self::Closed | Self::Abandoned => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Draft,
    Locked,
}

impl Lifecycle for DecisionStatus {
    const ENTITY: &'static str = "decision";
    const ALL: &'static [Self] = &[Self::Draft, Self::Locked];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Locked => "LOCKED",
        }
    }

    fn targets(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Locked],
            Self::Locked => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Lifecycle for TaskStatus {
    const ENTITY: &'static str = "task";
    const ALL: &'static [Self] = &[
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    fn targets(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Cancelled],
            // IN_PROGRESS -> PENDING is a pause.
            Self::InProgress => &[Self::Completed, Self::Pending, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for IdeaStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        status_from_sql(value)
    }
}

impl FromSql for PhaseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        status_from_sql(value)
    }
}

impl FromSql for DecisionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        status_from_sql(value)
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        status_from_sql(value)
    }
}

impl ToSql for IdeaStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl ToSql for PhaseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl ToSql for DecisionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}
