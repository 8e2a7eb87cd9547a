//! The idea -> phase -> decision -> task -> document workflow.
//!
//! Entities are immutable values whose transition methods consume `self`. All
//! persistence goes through [`repository::Repository`], which re-verifies content
//! hashes on every read; all mutations go through [`enforcer::Enforcer`].

pub mod audit;
pub mod confirm;
pub mod decision;
pub mod document;
pub mod enforcer;
pub mod idea;
pub mod invariants;
pub mod phase;
pub mod repository;
pub mod status;
pub mod task;

use crate::core::error::{Result, WorkflowError};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TEXT_LEN: usize = 100_000;

/// Titles are required and short; free text is bounded.
pub(crate) fn validate_text(field: &str, value: &str, is_title: bool) -> Result<()> {
    if is_title && value.trim().is_empty() {
        return Err(WorkflowError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    let max = if is_title { MAX_TITLE_LEN } else { MAX_TEXT_LEN };
    if value.chars().count() > max {
        return Err(WorkflowError::ValidationError(format!(
            "{} exceeds {} characters",
            field, max
        )));
    }
    Ok(())
}
