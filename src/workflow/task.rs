use crate::core::error::{Result, WorkflowError};
use crate::core::hash;
use crate::core::time;
use crate::workflow::status::{Lifecycle, TaskStatus};
use crate::workflow::validate_text;
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "TK";
pub const ENTITY: &str = "task";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub decision_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn new(decision_id: &str, title: &str, description: &str) -> Result<Self> {
        validate_text("title", title, true)?;
        validate_text("description", description, false)?;
        let now = time::now_millis();
        let title = title.trim().to_string();
        Ok(Self {
            id: time::new_id(ID_PREFIX),
            decision_id: decision_id.to_string(),
            content_hash: hash::task_hash(decision_id, &title, description),
            title,
            description: description.to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn compute_hash(&self) -> String {
        hash::task_hash(&self.decision_id, &self.title, &self.description)
    }

    pub fn verify(&self) -> Result<()> {
        hash::verify(ENTITY, &self.id, &self.content_hash, &self.compute_hash())
    }

    pub fn revise(self, title: &str, description: &str) -> Result<Self> {
        if self.status.is_terminal() {
            return Err(WorkflowError::ValidationError(format!(
                "task '{}' is {} and can no longer be edited",
                self.id, self.status
            )));
        }
        validate_text("title", title, true)?;
        validate_text("description", description, false)?;
        let title = title.trim().to_string();
        Ok(Self {
            content_hash: hash::task_hash(&self.decision_id, &title, description),
            title,
            description: description.to_string(),
            updated_at: time::now_millis(),
            ..self
        })
    }

    pub fn transition(self, to: TaskStatus) -> Result<Self> {
        self.status.validate_transition(to)?;
        let now = time::now_millis();
        Ok(Self {
            status: to,
            updated_at: now,
            completed_at: if to == TaskStatus::Completed { Some(now) } else { None },
            ..self
        })
    }

    pub fn start(self) -> Result<Self> {
        self.transition(TaskStatus::InProgress)
    }

    pub fn pause(self) -> Result<Self> {
        self.transition(TaskStatus::Pending)
    }

    pub fn complete(self) -> Result<Self> {
        self.transition(TaskStatus::Completed)
    }

    pub fn cancel(self) -> Result<Self> {
        self.transition(TaskStatus::Cancelled)
    }
}
