use crate::core::error::Result;
use crate::core::hash;
use crate::core::time;
use crate::workflow::status::{Lifecycle, PhaseStatus};
use crate::workflow::validate_text;
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "PH";
pub const ENTITY: &str = "phase";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: PhaseStatus,
    pub content_hash: String,
    pub source_idea_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
}

impl Phase {
    pub fn new(name: &str, description: &str, source_idea_id: Option<&str>) -> Result<Self> {
        validate_text("name", name, true)?;
        validate_text("description", description, false)?;
        let now = time::now_millis();
        let name = name.trim().to_string();
        Ok(Self {
            id: time::new_id(ID_PREFIX),
            content_hash: hash::phase_hash(&name, description),
            name,
            description: description.to_string(),
            status: PhaseStatus::Active,
            source_idea_id: source_idea_id.map(str::to_string),
            created_at: now,
            updated_at: now,
            closed_at: None,
        })
    }

    pub fn compute_hash(&self) -> String {
        hash::phase_hash(&self.name, &self.description)
    }

    pub fn verify(&self) -> Result<()> {
        hash::verify(ENTITY, &self.id, &self.content_hash, &self.compute_hash())
    }

    pub fn revise(self, name: &str, description: &str) -> Result<Self> {
        validate_text("name", name, true)?;
        validate_text("description", description, false)?;
        let name = name.trim().to_string();
        Ok(Self {
            content_hash: hash::phase_hash(&name, description),
            name,
            description: description.to_string(),
            updated_at: time::now_millis(),
            ..self
        })
    }

    pub fn transition(self, to: PhaseStatus) -> Result<Self> {
        self.status.validate_transition(to)?;
        let now = time::now_millis();
        Ok(Self {
            status: to,
            updated_at: now,
            closed_at: if to.is_terminal() { Some(now) } else { self.closed_at },
            ..self
        })
    }

    pub fn close(self) -> Result<Self> {
        self.transition(PhaseStatus::Closed)
    }

    pub fn abandon(self) -> Result<Self> {
        self.transition(PhaseStatus::Abandoned)
    }
}
