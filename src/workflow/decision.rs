//! Decisions. The content hash chains in `phase_id`; a LOCKED decision never changes again.

use crate::core::error::{Result, WorkflowError};
use crate::core::hash;
use crate::core::time;
use crate::workflow::status::{DecisionStatus, Lifecycle};
use crate::workflow::validate_text;
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "DC";
pub const ENTITY: &str = "decision";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub phase_id: String,
    pub title: String,
    pub statement: String,
    pub rationale: String,
    pub status: DecisionStatus,
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub locked_at: Option<i64>,
}

/// Caller-supplied decision content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionDraft {
    pub title: String,
    pub statement: String,
    pub rationale: String,
}

impl DecisionDraft {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        validate_text("title", &self.title, true)?;
        validate_text("statement", &self.statement, false)?;
        validate_text("rationale", &self.rationale, false)
    }
}

impl Decision {
    pub fn new(phase_id: &str, draft: &DecisionDraft) -> Result<Self> {
        draft.validate()?;
        let now = time::now_millis();
        let title = draft.title.trim().to_string();
        Ok(Self {
            id: time::new_id(ID_PREFIX),
            phase_id: phase_id.to_string(),
            content_hash: hash::decision_hash(phase_id, &title, &draft.statement, &draft.rationale),
            title,
            statement: draft.statement.clone(),
            rationale: draft.rationale.clone(),
            status: DecisionStatus::Draft,
            created_at: now,
            updated_at: now,
            locked_at: None,
        })
    }

    pub fn compute_hash(&self) -> String {
        hash::decision_hash(&self.phase_id, &self.title, &self.statement, &self.rationale)
    }

    pub fn verify(&self) -> Result<()> {
        hash::verify(ENTITY, &self.id, &self.content_hash, &self.compute_hash())
    }

    pub fn is_locked(&self) -> bool {
        self.status == DecisionStatus::Locked
    }

    pub fn revise(self, draft: &DecisionDraft) -> Result<Self> {
        if self.is_locked() {
            return Err(WorkflowError::LockedDecisionImmutable {
                decision_id: self.id,
            });
        }
        draft.validate()?;
        let title = draft.title.trim().to_string();
        Ok(Self {
            content_hash: hash::decision_hash(
                &self.phase_id,
                &title,
                &draft.statement,
                &draft.rationale,
            ),
            title,
            statement: draft.statement.clone(),
            rationale: draft.rationale.clone(),
            updated_at: time::now_millis(),
            ..self
        })
    }

    /// Content is untouched, so the hash carried into the LOCKED state is final.
    pub fn lock(self) -> Result<Self> {
        if self.is_locked() {
            return Err(WorkflowError::LockedDecisionImmutable {
                decision_id: self.id,
            });
        }
        self.status.validate_transition(DecisionStatus::Locked)?;
        let now = time::now_millis();
        Ok(Self {
            status: DecisionStatus::Locked,
            updated_at: now,
            locked_at: Some(now),
            ..self
        })
    }
}
