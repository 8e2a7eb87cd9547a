//! Phase documents and their immutable close-time snapshots.

use crate::core::error::Result;
use crate::core::hash;
use crate::core::time;
use crate::workflow::validate_text;
use serde::{Deserialize, Serialize};

pub const ID_PREFIX: &str = "DO";
pub const SNAPSHOT_ID_PREFIX: &str = "SN";
pub const ENTITY: &str = "document";
pub const SNAPSHOT_ENTITY: &str = "document_snapshot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub phase_id: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub id: String,
    pub document_id: String,
    pub phase_id: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: i64,
}

impl Document {
    pub fn new(phase_id: &str, title: &str, content: &str) -> Result<Self> {
        validate_text("title", title, true)?;
        validate_text("content", content, false)?;
        let now = time::now_millis();
        let title = title.trim().to_string();
        Ok(Self {
            id: time::new_id(ID_PREFIX),
            phase_id: phase_id.to_string(),
            content_hash: hash::document_hash(phase_id, &title, content),
            title,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn compute_hash(&self) -> String {
        hash::document_hash(&self.phase_id, &self.title, &self.content)
    }

    pub fn verify(&self) -> Result<()> {
        hash::verify(ENTITY, &self.id, &self.content_hash, &self.compute_hash())
    }

    pub fn revise(self, title: &str, content: &str) -> Result<Self> {
        validate_text("title", title, true)?;
        validate_text("content", content, false)?;
        let title = title.trim().to_string();
        Ok(Self {
            content_hash: hash::document_hash(&self.phase_id, &title, content),
            title,
            content: content.to_string(),
            updated_at: time::now_millis(),
            ..self
        })
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: time::new_id(SNAPSHOT_ID_PREFIX),
            document_id: self.id.clone(),
            phase_id: self.phase_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            content_hash: self.content_hash.clone(),
            created_at: time::now_millis(),
        }
    }
}

impl DocumentSnapshot {
    pub fn compute_hash(&self) -> String {
        hash::document_hash(&self.phase_id, &self.title, &self.content)
    }

    pub fn verify(&self) -> Result<()> {
        hash::verify(
            SNAPSHOT_ENTITY,
            &self.id,
            &self.content_hash,
            &self.compute_hash(),
        )
    }
}
