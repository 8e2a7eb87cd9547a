//! Shared timestamp and identifier helpers.

use crate::core::error::{Result, WorkflowError};
use regex::Regex;
use std::sync::OnceLock;
use ulid::Ulid;

/// Unix-epoch milliseconds. Stored as INTEGER so range queries compare numerically.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Prefixed ULID, e.g. `PH_01J...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{2}_[0-9A-HJKMNP-TV-Z]{26}$").expect("static id pattern compiles")
    })
}

/// Rejects malformed identifiers before any store access.
pub fn validate_id(prefix: &str, id: &str) -> Result<()> {
    if id_pattern().is_match(id) && id.starts_with(prefix) && id[prefix.len()..].starts_with('_') {
        Ok(())
    } else {
        Err(WorkflowError::ValidationError(format!(
            "invalid id '{}': expected {}_<ULID>",
            id, prefix
        )))
    }
}
