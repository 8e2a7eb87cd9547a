//! Parking-lot ideas. A promoted idea spawns exactly one phase.

use crate::core::error::{Result, WorkflowError};
use crate::core::time;
use crate::workflow::status::{IdeaStatus, Lifecycle};
use crate::workflow::validate_text;
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub content: String,
    pub status: IdeaStatus,
    pub promoted_phase_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Idea {
    pub fn new(title: &str, content: &str) -> Result<Self> {
        validate_text("title", title, true)?;
        validate_text("content", content, false)?;
        let now = time::now_millis();
        Ok(Self {
            id: time::new_id(ID_PREFIX),
            title: title.trim().to_string(),
            content: content.to_string(),
            status: IdeaStatus::Parked,
            promoted_phase_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn promote(self, phase_id: &str) -> Result<Self> {
        self.status.validate_transition(IdeaStatus::Promoted)?;
        if phase_id.is_empty() {
            return Err(WorkflowError::ValidationError(
                "promotion requires a phase id".to_string(),
            ));
        }
        Ok(Self {
            status: IdeaStatus::Promoted,
            promoted_phase_id: Some(phase_id.to_string()),
            updated_at: time::now_millis(),
            ..self
        })
    }

    pub fn abandon(self) -> Result<Self> {
        self.status.validate_transition(IdeaStatus::Abandoned)?;
        Ok(Self {
            status: IdeaStatus::Abandoned,
            updated_at: time::now_millis(),
            ..self
        })
    }
}
